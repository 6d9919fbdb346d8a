use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Postgres;

use crate::models::{
    Aggregator, AggregatorAuthorization, AggregatorPostLedgerEntry,
    AGGREGATOR_RATE_LIMIT_WINDOW_SECS,
};

use super::DbPool;

pub async fn get(pool: &DbPool, did: &str) -> Result<Option<Aggregator>> {
    sqlx::query_as::<_, Aggregator>(
        r#"
        SELECT did, display_name, description, config_schema, maintainer_did, source_url,
               record_uri, record_cid, communities_using, posts_created, created_at, indexed_at
        FROM aggregators WHERE did = $1
        "#,
    )
    .bind(did)
    .fetch_optional(pool)
    .await
    .context("failed to fetch aggregator")
}

pub async fn get_authorization(
    pool: &DbPool,
    aggregator_did: &str,
    community_did: &str,
) -> Result<Option<AggregatorAuthorization>> {
    sqlx::query_as::<_, AggregatorAuthorization>(
        r#"
        SELECT aggregator_did, community_did, enabled, config, created_by, disabled_by,
               disabled_at, record_uri, record_cid, created_at, indexed_at
        FROM aggregator_authorizations WHERE aggregator_did = $1 AND community_did = $2
        "#,
    )
    .bind(aggregator_did)
    .bind(community_did)
    .fetch_optional(pool)
    .await
    .context("failed to fetch aggregator authorization")
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_authorization(
    pool: &DbPool,
    aggregator_did: &str,
    community_did: &str,
    enabled: bool,
    config: &Value,
    created_by: &str,
    disabled_by: Option<&str>,
    record_uri: &str,
    record_cid: &str,
) -> Result<AggregatorAuthorization> {
    let disabled_at = if enabled { None } else { Some(Utc::now()) };
    sqlx::query_as::<_, AggregatorAuthorization>(
        r#"
        INSERT INTO aggregator_authorizations (
            aggregator_did, community_did, enabled, config, created_by, disabled_by,
            disabled_at, record_uri, record_cid, created_at, indexed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
        ON CONFLICT (aggregator_did, community_did) DO UPDATE SET
            enabled = EXCLUDED.enabled,
            config = EXCLUDED.config,
            disabled_by = EXCLUDED.disabled_by,
            disabled_at = EXCLUDED.disabled_at,
            record_uri = EXCLUDED.record_uri,
            record_cid = EXCLUDED.record_cid,
            indexed_at = now()
        RETURNING aggregator_did, community_did, enabled, config, created_by, disabled_by,
                  disabled_at, record_uri, record_cid, created_at, indexed_at
        "#,
    )
    .bind(aggregator_did)
    .bind(community_did)
    .bind(enabled)
    .bind(config)
    .bind(created_by)
    .bind(disabled_by)
    .bind(disabled_at)
    .bind(record_uri)
    .bind(record_cid)
    .fetch_one(pool)
    .await
    .context("failed to upsert aggregator authorization")
}

/// Count of ledger entries in the trailing rate-limit window (§4.1.6).
pub async fn count_recent_ledger_entries(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    aggregator_did: &str,
    community_did: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let since = now - chrono::Duration::seconds(AGGREGATOR_RATE_LIMIT_WINDOW_SECS);
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT count(*) FROM aggregator_post_ledger
        WHERE aggregator_did = $1 AND community_did = $2 AND created_at >= $3
        "#,
    )
    .bind(aggregator_did)
    .bind(community_did)
    .bind(since)
    .fetch_one(&mut **tx)
    .await
    .context("failed to count aggregator ledger entries")?;
    Ok(count)
}

pub async fn append_ledger_entry(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    aggregator_did: &str,
    community_did: &str,
    post_uri: &str,
    post_cid: &str,
    now: DateTime<Utc>,
) -> Result<AggregatorPostLedgerEntry> {
    sqlx::query_as::<_, AggregatorPostLedgerEntry>(
        r#"
        INSERT INTO aggregator_post_ledger (aggregator_did, community_did, post_uri, post_cid, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING aggregator_did, community_did, post_uri, post_cid, created_at
        "#,
    )
    .bind(aggregator_did)
    .bind(community_did)
    .bind(post_uri)
    .bind(post_cid)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .context("failed to append aggregator ledger entry")
}
