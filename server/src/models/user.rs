use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A known repository owner. Created only via authenticated signup;
/// updated in place on identity events for already-known DIDs (§4.1.1).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub did: String,
    pub handle: String,
    pub pds_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
