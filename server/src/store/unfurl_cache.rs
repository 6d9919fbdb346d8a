use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::{UnfurlCacheEntry, UNFURL_TTL_SECS};

use super::DbPool;

/// Returns a cached entry only if it is within the 24h TTL (§3).
pub async fn get_fresh(pool: &DbPool, url: &str) -> Result<Option<UnfurlCacheEntry>> {
    let entry = sqlx::query_as::<_, UnfurlCacheEntry>(
        r#"
        SELECT url, type, title, description, thumbnail_url, provider, domain, width, height, fetched_at
        FROM unfurl_cache WHERE url = $1
        "#,
    )
    .bind(url)
    .fetch_optional(pool)
    .await
    .context("failed to fetch unfurl cache entry")?;

    Ok(entry.filter(|e| {
        (Utc::now() - e.fetched_at).num_seconds() < UNFURL_TTL_SECS
    }))
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &DbPool,
    url: &str,
    r#type: &str,
    title: Option<&str>,
    description: Option<&str>,
    thumbnail_url: Option<&str>,
    provider: Option<&str>,
    domain: Option<&str>,
    width: Option<i32>,
    height: Option<i32>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO unfurl_cache (url, type, title, description, thumbnail_url, provider, domain, width, height, fetched_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (url) DO UPDATE SET
            type = EXCLUDED.type, title = EXCLUDED.title, description = EXCLUDED.description,
            thumbnail_url = EXCLUDED.thumbnail_url, provider = EXCLUDED.provider,
            domain = EXCLUDED.domain, width = EXCLUDED.width, height = EXCLUDED.height,
            fetched_at = now()
        "#,
    )
    .bind(url)
    .bind(r#type)
    .bind(title)
    .bind(description)
    .bind(thumbnail_url)
    .bind(provider)
    .bind(domain)
    .bind(width)
    .bind(height)
    .execute(pool)
    .await
    .context("failed to upsert unfurl cache entry")?;
    Ok(())
}

/// Deletes entries past their TTL — run periodically by
/// `jobs::unfurl_cache_cleanup`.
pub async fn delete_expired(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM unfurl_cache WHERE fetched_at < now() - make_interval(secs => $1)")
        .bind(UNFURL_TTL_SECS as f64)
        .execute(pool)
        .await
        .context("failed to delete expired unfurl cache entries")?;
    Ok(result.rows_affected())
}
