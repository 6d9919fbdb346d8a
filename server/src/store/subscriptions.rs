use anyhow::{Context, Result};

use crate::models::CommunitySubscription;

use super::DbPool;

pub async fn list_subscribed_community_dids(pool: &DbPool, user_did: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT community_did FROM community_subscriptions WHERE user_did = $1",
    )
    .bind(user_did)
    .fetch_all(pool)
    .await
    .context("failed to list subscribed communities")?;
    Ok(rows.into_iter().map(|(did,)| did).collect())
}

pub async fn upsert(
    pool: &DbPool,
    user_did: &str,
    community_did: &str,
    content_visibility: &str,
) -> Result<CommunitySubscription> {
    sqlx::query_as::<_, CommunitySubscription>(
        r#"
        INSERT INTO community_subscriptions (user_did, community_did, content_visibility, subscribed_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (user_did, community_did)
        DO UPDATE SET content_visibility = EXCLUDED.content_visibility
        RETURNING user_did, community_did, content_visibility, subscribed_at
        "#,
    )
    .bind(user_did)
    .bind(community_did)
    .bind(content_visibility)
    .fetch_one(pool)
    .await
    .context("failed to upsert community subscription")
}

pub async fn remove(pool: &DbPool, user_did: &str, community_did: &str) -> Result<()> {
    sqlx::query("DELETE FROM community_subscriptions WHERE user_did = $1 AND community_did = $2")
        .bind(user_did)
        .bind(community_did)
        .execute(pool)
        .await
        .context("failed to remove community subscription")?;
    Ok(())
}
