use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// At most one live vote per (voter_did, subject_uri) (§3, I5).
#[derive(Debug, Clone, FromRow)]
pub struct Vote {
    pub uri: String,
    pub cid: String,
    pub rkey: String,
    pub voter_did: String,
    pub subject_uri: String,
    pub subject_cid: String,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}
