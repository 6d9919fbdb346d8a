use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Aggregator {
    pub did: String,
    pub display_name: String,
    pub description: Option<String>,
    pub config_schema: Value,
    pub maintainer_did: String,
    pub source_url: Option<String>,
    pub record_uri: String,
    pub record_cid: String,
    pub communities_using: i64,
    pub posts_created: i64,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

/// Unique per (aggregator_did, community_did). A disabled authorization is
/// retained, not deleted, for audit (§4.1.5).
#[derive(Debug, Clone, FromRow)]
pub struct AggregatorAuthorization {
    pub aggregator_did: String,
    pub community_did: String,
    pub enabled: bool,
    pub config: Value,
    pub created_by: String,
    pub disabled_by: Option<String>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub record_uri: String,
    pub record_cid: String,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

/// Append-only ledger used for the aggregator post rate limit (§4.1.6).
#[derive(Debug, Clone, FromRow)]
pub struct AggregatorPostLedgerEntry {
    pub aggregator_did: String,
    pub community_did: String,
    pub post_uri: String,
    pub post_cid: String,
    pub created_at: DateTime<Utc>,
}

/// §4.1.6: at most 9 posts in the trailing hour before the 10th is rejected.
pub const AGGREGATOR_RATE_LIMIT_WINDOW_SECS: i64 = 3600;
pub const AGGREGATOR_RATE_LIMIT_MAX: i64 = 10;
