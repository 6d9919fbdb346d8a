use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A threaded reply (§3). `root_*`/`parent_*` are immutable across updates
/// once a live row exists at `uri` (§4.1.3 threading immutability) but may
/// be rebound on resurrection (§9 — source-followed open question).
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub uri: String,
    pub cid: String,
    pub rkey: String,
    pub commenter_did: String,
    pub root_uri: String,
    pub root_cid: String,
    pub parent_uri: String,
    pub parent_cid: String,
    pub content: String,
    pub langs: Option<Vec<String>>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub score: i64,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether `self` is the direct parent Post (root == parent == post uri),
    /// vs. a reply to another comment.
    pub fn parent_is_post(&self) -> bool {
        self.parent_uri == self.root_uri
    }
}

pub const MAX_CONTENT_BYTES: usize = 30_000;
