use anyhow::{Context, Result};

use crate::models::Community;

use super::{validate_did_batch, DbPool, StoreError};

const SELECT_COLUMNS: &str = r#"
    did, handle, name, display_name, description, owner_did, created_by_did, hosted_by_did,
    visibility, moderation_type, pds_url, pds_email, pds_password_sealed,
    pds_access_token_sealed, pds_refresh_token_sealed, record_uri, record_cid, post_count,
    created_at, updated_at
"#;

pub async fn get_by_did(pool: &DbPool, did: &str) -> Result<Option<Community>> {
    sqlx::query_as::<_, Community>(&format!(
        "SELECT {SELECT_COLUMNS} FROM communities WHERE did = $1"
    ))
    .bind(did)
    .fetch_optional(pool)
    .await
    .context("failed to fetch community")
}

pub async fn get_by_name(pool: &DbPool, name: &str) -> Result<Option<Community>> {
    sqlx::query_as::<_, Community>(&format!(
        "SELECT {SELECT_COLUMNS} FROM communities WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("failed to fetch community by name")
}

pub async fn get_by_handle(pool: &DbPool, handle: &str) -> Result<Option<Community>> {
    sqlx::query_as::<_, Community>(&format!(
        "SELECT {SELECT_COLUMNS} FROM communities WHERE handle = $1"
    ))
    .bind(handle)
    .fetch_optional(pool)
    .await
    .context("failed to fetch community by handle")
}

/// `GetCommunitiesByDIDs` (§4.4), the community-side twin of
/// `users::get_by_dids` used by feed hydration.
pub async fn get_by_dids(pool: &DbPool, dids: &[String]) -> Result<Vec<Community>, StoreError> {
    validate_did_batch(dids)?;
    if dids.is_empty() {
        return Ok(Vec::new());
    }
    let communities = sqlx::query_as::<_, Community>(&format!(
        "SELECT {SELECT_COLUMNS} FROM communities WHERE did = ANY($1)"
    ))
    .bind(dids)
    .fetch_all(pool)
    .await?;
    Ok(communities)
}

/// All communities, for the periodic session-refresh worker
/// (`jobs::credential_refresh`) to walk.
pub async fn list_all(pool: &DbPool) -> Result<Vec<Community>> {
    sqlx::query_as::<_, Community>(&format!("SELECT {SELECT_COLUMNS} FROM communities"))
        .fetch_all(pool)
        .await
        .context("failed to list communities")
}

pub struct NewCommunity<'a> {
    pub did: &'a str,
    pub handle: &'a str,
    pub name: &'a str,
    pub display_name: &'a str,
    pub owner_did: &'a str,
    pub created_by_did: &'a str,
    pub hosted_by_did: &'a str,
    pub pds_url: &'a str,
    pub pds_email: &'a str,
    pub pds_password_sealed: &'a str,
    pub pds_access_token_sealed: &'a str,
    pub pds_refresh_token_sealed: &'a str,
    pub record_uri: &'a str,
    pub record_cid: &'a str,
}

/// Inserts the community row written by provisioning (§4.3 step 3). The
/// caller is responsible for not writing a partial row on PDS failure —
/// this is only called once all PDS calls have already succeeded.
pub async fn create(pool: &DbPool, new: NewCommunity<'_>) -> Result<Community> {
    sqlx::query_as::<_, Community>(&format!(
        r#"
        INSERT INTO communities (
            did, handle, name, display_name, owner_did, created_by_did, hosted_by_did,
            visibility, moderation_type, pds_url, pds_email, pds_password_sealed,
            pds_access_token_sealed, pds_refresh_token_sealed, record_uri, record_cid,
            post_count, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'public', 'standard', $8, $9, $10, $11, $12, $13, $14,
            0, now(), now())
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(new.did)
    .bind(new.handle)
    .bind(new.name)
    .bind(new.display_name)
    .bind(new.owner_did)
    .bind(new.created_by_did)
    .bind(new.hosted_by_did)
    .bind(new.pds_url)
    .bind(new.pds_email)
    .bind(new.pds_password_sealed)
    .bind(new.pds_access_token_sealed)
    .bind(new.pds_refresh_token_sealed)
    .bind(new.record_uri)
    .bind(new.record_cid)
    .fetch_one(pool)
    .await
    .context("failed to create community")
}

/// Profile-commit update path (§4.1.5): display_name/description only —
/// credentials and ownership are never touched by firehose events.
pub async fn update_profile(
    pool: &DbPool,
    did: &str,
    display_name: &str,
    description: Option<&str>,
) -> Result<Option<Community>> {
    sqlx::query_as::<_, Community>(&format!(
        r#"
        UPDATE communities SET display_name = $2, description = $3, updated_at = now()
        WHERE did = $1
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(did)
    .bind(display_name)
    .bind(description)
    .fetch_optional(pool)
    .await
    .context("failed to update community profile")
}

/// Replaces the community's sealed session tokens within one transaction
/// (§4.3 credential lifecycle).
pub async fn update_session_tokens(
    pool: &DbPool,
    did: &str,
    access_token_sealed: &str,
    refresh_token_sealed: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE communities
        SET pds_access_token_sealed = $2, pds_refresh_token_sealed = $3, updated_at = now()
        WHERE did = $1
        "#,
    )
    .bind(did)
    .bind(access_token_sealed)
    .bind(refresh_token_sealed)
    .execute(pool)
    .await
    .context("failed to update community session tokens")?;
    Ok(())
}

pub async fn increment_post_count(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    community_did: &str,
    delta: i64,
) -> Result<()> {
    sqlx::query("UPDATE communities SET post_count = post_count + $2 WHERE did = $1")
        .bind(community_did)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .context("failed to adjust community post_count")?;
    Ok(())
}
