use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct CommunitySubscription {
    pub user_did: String,
    pub community_did: String,
    pub content_visibility: String,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommunityBlock {
    pub user_did: String,
    pub community_did: String,
    pub record_uri: String,
    pub record_cid: String,
    pub blocked_at: DateTime<Utc>,
}
