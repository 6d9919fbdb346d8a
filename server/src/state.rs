//! Composite app state (§5), mirroring the teacher's
//! `AppState { db_pool, sse_state, actor_registry, ... }` pattern: one
//! process-wide struct threaded through every handler via `FromRef`.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::community::PdsClient;
use crate::config::Config;
use crate::feed::hydrate::Hydrator;
use crate::firehose::dispatcher::DispatcherHandle;
use crate::store::DbPool;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: DbPool,
    pub hydrator: Hydrator,
    pub dispatcher: DispatcherHandle,
    pub config: Arc<Config>,
    pub pds_client: Arc<dyn PdsClient>,
}
