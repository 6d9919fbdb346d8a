use anyhow::{Context, Result};

use crate::models::{IdentityCacheEntry, IDENTITY_CACHE_TTL_SECS};

use super::DbPool;

pub async fn get_by_handle(pool: &DbPool, handle: &str) -> Result<Option<IdentityCacheEntry>> {
    sqlx::query_as::<_, IdentityCacheEntry>(
        "SELECT handle, did, pds_url, method, resolved_at FROM identity_cache WHERE handle = $1",
    )
    .bind(handle)
    .fetch_optional(pool)
    .await
    .context("failed to fetch identity cache entry")
}

pub async fn upsert(
    pool: &DbPool,
    handle: &str,
    did: &str,
    pds_url: &str,
    method: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO identity_cache (handle, did, pds_url, method, resolved_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (handle, did) DO UPDATE SET pds_url = EXCLUDED.pds_url, resolved_at = now()
        "#,
    )
    .bind(handle)
    .bind(did)
    .bind(pds_url)
    .bind(method)
    .execute(pool)
    .await
    .context("failed to upsert identity cache entry")?;
    Ok(())
}

/// Purges rows keyed by either the old handle or the DID (§4.1.1).
pub async fn purge_for(pool: &DbPool, handle: &str, did: &str) -> Result<()> {
    sqlx::query("DELETE FROM identity_cache WHERE handle = $1 OR did = $2")
        .bind(handle)
        .bind(did)
        .execute(pool)
        .await
        .context("failed to purge identity cache entries")?;
    Ok(())
}

/// Deletes entries past the TTL backstop — run periodically by
/// `jobs::identity_cache_cleanup`.
pub async fn delete_expired(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM identity_cache WHERE resolved_at < now() - make_interval(secs => $1)",
    )
    .bind(IDENTITY_CACHE_TTL_SECS as f64)
    .execute(pool)
    .await
    .context("failed to delete expired identity cache entries")?;
    Ok(result.rows_affected())
}
