use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Lazily-fetched link-preview metadata. TTL 24h (§3).
#[derive(Debug, Clone, FromRow)]
pub struct UnfurlCacheEntry {
    pub url: String,
    pub r#type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub provider: Option<String>,
    pub domain: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fetched_at: DateTime<Utc>,
}

pub const UNFURL_TTL_SECS: i64 = 24 * 3600;

/// handle<->DID resolution cache, purged on identity-change events (§3, §4.1.1).
#[derive(Debug, Clone, FromRow)]
pub struct IdentityCacheEntry {
    pub handle: String,
    pub did: String,
    pub pds_url: String,
    pub method: String,
    pub resolved_at: DateTime<Utc>,
}

/// Backstop for entries whose owning repo moved without an identity event
/// ever reaching this AppView — event-driven purging (§4.1.1) is the
/// primary invalidation path, this is only a periodic safety net.
pub const IDENTITY_CACHE_TTL_SECS: i64 = 7 * 24 * 3600;
