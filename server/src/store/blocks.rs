use anyhow::{Context, Result};

use super::DbPool;

/// Idempotent keyed by (user_did, community_did); re-creating with a
/// different record URI overwrites the record URI/CID (§4.1.5).
pub async fn upsert(
    pool: &DbPool,
    user_did: &str,
    community_did: &str,
    record_uri: &str,
    record_cid: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO community_blocks (user_did, community_did, record_uri, record_cid, blocked_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (user_did, community_did)
        DO UPDATE SET record_uri = EXCLUDED.record_uri, record_cid = EXCLUDED.record_cid
        "#,
    )
    .bind(user_did)
    .bind(community_did)
    .bind(record_uri)
    .bind(record_cid)
    .execute(pool)
    .await
    .context("failed to upsert community block")?;
    Ok(())
}

pub async fn remove(pool: &DbPool, user_did: &str, community_did: &str) -> Result<()> {
    sqlx::query("DELETE FROM community_blocks WHERE user_did = $1 AND community_did = $2")
        .bind(user_did)
        .bind(community_did)
        .execute(pool)
        .await
        .context("failed to remove community block")?;
    Ok(())
}
