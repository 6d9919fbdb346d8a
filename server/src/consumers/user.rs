//! User consumer (§4.1.1): identity events only ever update an existing,
//! already-signed-up User — they never create one.

use tracing::warn;

use crate::firehose::CommitEvent;
use crate::store::{identity_cache, users, DbPool};

use super::{ConsumeError, ConsumeOutcome};

/// Handles an identity event carried as a `CommitEvent` whose `record`
/// field is the identity payload `{handle}` (the firehose dispatcher maps
/// `IdentityEvent` onto this shape before routing — see `firehose::decode`).
pub async fn handle(pool: &DbPool, event: &CommitEvent) -> Result<ConsumeOutcome, ConsumeError> {
    let repo_did = &event.repo_did;
    let record = event
        .record
        .as_ref()
        .ok_or_else(|| ConsumeError::InvalidEvent("identity event missing payload".into()))?;
    let handle = record
        .get("handle")
        .and_then(|h| h.as_str())
        .ok_or_else(|| ConsumeError::InvalidEvent("identity event missing handle".into()))?;

    let Some(existing) = users::get_by_did(pool, repo_did).await? else {
        warn!(repo_did, "identity event for unknown DID, skipping");
        return Ok(ConsumeOutcome::Ignored);
    };

    if existing.handle == handle {
        return Ok(ConsumeOutcome::Ignored);
    }

    identity_cache::purge_for(pool, &existing.handle, repo_did).await?;
    users::update_handle(pool, repo_did, handle).await?;
    Ok(ConsumeOutcome::Updated)
}
