//! Record Consumers (§4.1) — the heart of the indexer. One module per
//! collection, each exposing a `handle` function that is a pure
//! transformation from a commit event to a single store transaction.
//! Dispatch-by-collection mirrors the teacher's `handlers` directory: one
//! file per operation, a thin `mod.rs` router in front of them.

pub mod aggregator_post;
pub mod comment;
pub mod community;
pub mod post;
pub mod user;
pub mod vote;

use thiserror::Error;

use crate::firehose::CommitEvent;
use crate::store::DbPool;

/// Rejections a consumer can return. Everything but `Storage` is a
/// permanent rejection the dispatcher logs and skips; `Storage` is
/// presumed transient and retried with backoff (§4.5, §7).
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("record already indexed")]
    AlreadyIndexed,
    #[error("threading refs are immutable on update")]
    ThreadingImmutable,
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("rate limited")]
    RateLimited,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ConsumeError {
    /// Whether the dispatcher should retry this event rather than skip it.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConsumeError::Storage(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Indexed,
    Resurrected,
    Updated,
    Deleted,
    /// The event targeted a DID/URI the store has no row for and that's
    /// expected (e.g. identity event for an unknown user) — not an error.
    Ignored,
}

/// Routes a commit event to its consumer by `collection`. Unknown
/// collections are ignored rather than rejected — the firehose carries
/// collections this AppView doesn't index.
pub async fn dispatch(pool: &DbPool, event: &CommitEvent) -> Result<ConsumeOutcome, ConsumeError> {
    match event.collection.as_str() {
        "social.coves.post" => post::handle(pool, event).await,
        "social.coves.comment" => comment::handle(pool, event).await,
        "social.coves.vote" => vote::handle(pool, event).await,
        "social.coves.community.profile" => community::handle_profile(pool, event).await,
        "social.coves.community.block" => community::handle_block(pool, event).await,
        "social.coves.aggregator.authorization" => community::handle_authorization(pool, event).await,
        _ => Ok(ConsumeOutcome::Ignored),
    }
}
