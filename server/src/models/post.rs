use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

/// A community post (§3). `score` and `comment_count` are denormalized and
/// maintained by the post/comment/vote consumers plus a store-level trigger
/// safety net (§4.1.7).
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub rkey: String,
    pub author_did: String,
    pub community_did: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub embed: Option<Value>,
    pub labels: Option<Value>,
    pub score: i64,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}
