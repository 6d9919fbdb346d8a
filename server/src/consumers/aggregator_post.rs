//! Aggregator post authoring (§4.1.6): the extra authorization and rate
//! limit check applied on top of the ordinary post consumer when the
//! author DID is a registered aggregator.

use chrono::{DateTime, Utc};
use sqlx::Postgres;

use crate::models::AGGREGATOR_RATE_LIMIT_MAX;
use crate::store::{aggregators, DbPool};

use super::ConsumeError;

/// Checks the authorization exists and is enabled. Read outside the
/// consumer's transaction — like the community-existence check in
/// `consumers::post` — since it's a precondition, not a mutation.
pub async fn check_authorized(
    pool: &DbPool,
    aggregator_did: &str,
    community_did: &str,
) -> Result<(), ConsumeError> {
    let authorization = aggregators::get_authorization(pool, aggregator_did, community_did)
        .await
        .map_err(anyhow::Error::from)?;
    let authorized = authorization.map(|a| a.enabled).unwrap_or(false);
    if !authorized {
        return Err(ConsumeError::Unauthorized(format!(
            "{aggregator_did} is not authorized to post to {community_did}"
        )));
    }
    Ok(())
}

/// Rejects with `RateLimited` if the ledger already has ≥
/// [`AGGREGATOR_RATE_LIMIT_MAX`] entries in the trailing window. Must run
/// inside the same transaction as the eventual ledger append so the check
/// and the write are atomic (§4.1.6).
pub async fn check_rate_limit(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    aggregator_did: &str,
    community_did: &str,
    now: DateTime<Utc>,
) -> Result<(), ConsumeError> {
    let recent = aggregators::count_recent_ledger_entries(tx, aggregator_did, community_did, now)
        .await
        .map_err(anyhow::Error::from)?;
    if recent >= AGGREGATOR_RATE_LIMIT_MAX {
        return Err(ConsumeError::RateLimited);
    }
    Ok(())
}

pub async fn append_ledger_entry(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    aggregator_did: &str,
    community_did: &str,
    post_uri: &str,
    post_cid: &str,
    now: DateTime<Utc>,
) -> Result<(), ConsumeError> {
    aggregators::append_ledger_entry(tx, aggregator_did, community_did, post_uri, post_cid, now)
        .await
        .map_err(anyhow::Error::from)?;
    Ok(())
}
