use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
}

/// A community: a first-class, self-owned PDS account provisioned by the
/// core (§4.3). Credential fields are ciphertext at rest — see `crate::seal`.
#[derive(Debug, Clone, FromRow)]
pub struct Community {
    pub did: String,
    pub handle: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub owner_did: String,
    pub created_by_did: String,
    pub hosted_by_did: String,
    pub visibility: Visibility,
    pub moderation_type: String,
    pub pds_url: String,
    pub pds_email: String,
    /// AEAD-sealed, base64-encoded. Recoverable (not hashed) — see §9.
    pub pds_password_sealed: String,
    pub pds_access_token_sealed: String,
    pub pds_refresh_token_sealed: String,
    pub record_uri: String,
    pub record_cid: String,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
