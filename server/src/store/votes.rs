use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Postgres;

use crate::models::{Direction, Vote};

pub async fn get_live_for_update(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    voter_did: &str,
    subject_uri: &str,
) -> Result<Option<Vote>> {
    sqlx::query_as::<_, Vote>(
        r#"
        SELECT uri, cid, rkey, voter_did, subject_uri, subject_cid, direction, created_at
        FROM votes WHERE voter_did = $1 AND subject_uri = $2 FOR UPDATE
        "#,
    )
    .bind(voter_did)
    .bind(subject_uri)
    .fetch_optional(&mut **tx)
    .await
    .context("failed to fetch live vote")
}

pub async fn get_by_uri(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
) -> Result<Option<Vote>> {
    sqlx::query_as::<_, Vote>(
        r#"
        SELECT uri, cid, rkey, voter_did, subject_uri, subject_cid, direction, created_at
        FROM votes WHERE uri = $1
        "#,
    )
    .bind(uri)
    .fetch_optional(&mut **tx)
    .await
    .context("failed to fetch vote by uri")
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    cid: &str,
    rkey: &str,
    voter_did: &str,
    subject_uri: &str,
    subject_cid: &str,
    direction: Direction,
    created_at: DateTime<Utc>,
) -> Result<Vote> {
    sqlx::query_as::<_, Vote>(
        r#"
        INSERT INTO votes (uri, cid, rkey, voter_did, subject_uri, subject_cid, direction, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING uri, cid, rkey, voter_did, subject_uri, subject_cid, direction, created_at
        "#,
    )
    .bind(uri)
    .bind(cid)
    .bind(rkey)
    .bind(voter_did)
    .bind(subject_uri)
    .bind(subject_cid)
    .bind(direction)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert vote")
}

pub async fn delete(tx: &mut sqlx::Transaction<'_, Postgres>, uri: &str) -> Result<Option<Vote>> {
    sqlx::query_as::<_, Vote>(
        r#"
        DELETE FROM votes WHERE uri = $1
        RETURNING uri, cid, rkey, voter_did, subject_uri, subject_cid, direction, created_at
        "#,
    )
    .bind(uri)
    .fetch_optional(&mut **tx)
    .await
    .context("failed to delete vote")
}
