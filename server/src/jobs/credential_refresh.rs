use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::community::{ensure_fresh_session, PdsClient};
use crate::seal::SealKey;
use crate::store::{communities, DbPool};

/// Proactively refreshes every community's PDS session ahead of expiry, so
/// a delegated write (§4.3) never has to pay for a cold refresh on the
/// request path. Grounded on the teacher's `jobs::key_package_cleanup`
/// interval-loop shape.
pub async fn run_credential_refresh_worker(pool: DbPool, pds: Arc<dyn PdsClient>, seal_key: SealKey) {
    let mut ticker = interval(Duration::from_secs(1800));

    info!("starting community credential refresh worker (runs every 30 minutes)");

    loop {
        ticker.tick().await;

        let communities = match communities::list_all(&pool).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to list communities for credential refresh");
                continue;
            }
        };

        for community in communities {
            let did = community.did.clone();
            if let Err(e) = ensure_fresh_session(&pool, pds.as_ref(), &seal_key, &community).await {
                warn!(did, error = %e, "community credential refresh failed, will retry next tick");
            }
        }
    }
}
