use anyhow::{Context, Result};

use crate::models::User;

use super::{validate_did_batch, DbPool, StoreError};

pub async fn get_by_did(pool: &DbPool, did: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"SELECT did, handle, pds_url, created_at, updated_at FROM users WHERE did = $1"#,
    )
    .bind(did)
    .fetch_optional(pool)
    .await
    .context("failed to fetch user")
}

pub async fn get_by_handle(pool: &DbPool, handle: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"SELECT did, handle, pds_url, created_at, updated_at FROM users WHERE handle = $1"#,
    )
    .bind(handle)
    .fetch_optional(pool)
    .await
    .context("failed to fetch user by handle")
}

/// Creates a user row. Used only by the authenticated signup path — never
/// by the identity-event consumer (§4.1.1).
pub async fn create(pool: &DbPool, did: &str, handle: &str, pds_url: &str) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (did, handle, pds_url, created_at, updated_at)
        VALUES ($1, $2, $3, now(), now())
        RETURNING did, handle, pds_url, created_at, updated_at
        "#,
    )
    .bind(did)
    .bind(handle)
    .bind(pds_url)
    .fetch_one(pool)
    .await
    .context("failed to create user")
}

pub async fn update_handle(pool: &DbPool, did: &str, new_handle: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET handle = $2, updated_at = now()
        WHERE did = $1
        RETURNING did, handle, pds_url, created_at, updated_at
        "#,
    )
    .bind(did)
    .bind(new_handle)
    .fetch_optional(pool)
    .await
    .context("failed to update user handle")
}

/// `GetUsersByDIDs` (§4.4): empty input -> empty mapping, batch cap enforced,
/// and the result never contains DIDs that weren't requested (it can only
/// be a subset of `dids`, by construction of the `= ANY($1)` query).
pub async fn get_by_dids(pool: &DbPool, dids: &[String]) -> Result<Vec<User>, StoreError> {
    validate_did_batch(dids)?;
    if dids.is_empty() {
        return Ok(Vec::new());
    }
    let users = sqlx::query_as::<_, User>(
        r#"SELECT did, handle, pds_url, created_at, updated_at FROM users WHERE did = ANY($1)"#,
    )
    .bind(dids)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Cascades the deletion of all records whose author/subject is `did` (§3).
pub async fn delete_account_cascade(pool: &DbPool, did: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM votes WHERE voter_did = $1")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE comments SET deleted_at = now() WHERE commenter_did = $1 AND deleted_at IS NULL")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE posts SET deleted_at = now() WHERE author_did = $1 AND deleted_at IS NULL")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM community_subscriptions WHERE user_did = $1")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM community_blocks WHERE user_did = $1")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE did = $1")
        .bind(did)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
