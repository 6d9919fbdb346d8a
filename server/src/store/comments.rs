use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Postgres;

use crate::models::Comment;

use super::DbPool;

const SELECT_COLUMNS: &str = r#"
    uri, cid, rkey, commenter_did, root_uri, root_cid, parent_uri, parent_cid, content, langs,
    upvote_count, downvote_count, score, reply_count, created_at, indexed_at, deleted_at
"#;

/// Comment count for `getProfile` stats (§6) — live comments only.
pub async fn count_by_author(pool: &DbPool, commenter_did: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM comments WHERE commenter_did = $1 AND deleted_at IS NULL",
    )
    .bind(commenter_did)
    .fetch_one(pool)
    .await
    .context("failed to count comments by author")?;
    Ok(count)
}

pub async fn get_by_uri(pool: &DbPool, uri: &str) -> Result<Option<Comment>> {
    sqlx::query_as::<_, Comment>(&format!("SELECT {SELECT_COLUMNS} FROM comments WHERE uri = $1"))
        .bind(uri)
        .fetch_optional(pool)
        .await
        .context("failed to fetch comment")
}

pub async fn get_for_update(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
) -> Result<Option<Comment>> {
    sqlx::query_as::<_, Comment>(&format!(
        "SELECT {SELECT_COLUMNS} FROM comments WHERE uri = $1 FOR UPDATE"
    ))
    .bind(uri)
    .fetch_optional(&mut **tx)
    .await
    .context("failed to lock comment for update")
}

pub struct NewComment<'a> {
    pub uri: &'a str,
    pub cid: &'a str,
    pub rkey: &'a str,
    pub commenter_did: &'a str,
    pub root_uri: &'a str,
    pub root_cid: &'a str,
    pub parent_uri: &'a str,
    pub parent_cid: &'a str,
    pub content: &'a str,
    pub langs: Option<&'a [String]>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    new: NewComment<'_>,
) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        INSERT INTO comments (
            uri, cid, rkey, commenter_did, root_uri, root_cid, parent_uri, parent_cid,
            content, langs, upvote_count, downvote_count, score, reply_count,
            created_at, indexed_at, deleted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, 0, 0, 0, $11, now(), NULL)
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(new.uri)
    .bind(new.cid)
    .bind(new.rkey)
    .bind(new.commenter_did)
    .bind(new.root_uri)
    .bind(new.root_cid)
    .bind(new.parent_uri)
    .bind(new.parent_cid)
    .bind(new.content)
    .bind(new.langs)
    .bind(new.created_at)
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert comment")
}

/// `update` commit when threading refs are unchanged (§4.1.3): content,
/// CID, langs only.
pub async fn update_content(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    cid: &str,
    content: &str,
    langs: Option<&[String]>,
) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        UPDATE comments SET cid = $2, content = $3, langs = $4
        WHERE uri = $1
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(uri)
    .bind(cid)
    .bind(content)
    .bind(langs)
    .fetch_one(&mut **tx)
    .await
    .context("failed to update comment content")
}

/// Resurrection (§4.1.3): refs MAY rebind — the new values replace the old
/// ones outright.
pub async fn resurrect(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    cid: &str,
    root_uri: &str,
    root_cid: &str,
    parent_uri: &str,
    parent_cid: &str,
    content: &str,
    langs: Option<&[String]>,
) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        UPDATE comments SET
            cid = $2, root_uri = $3, root_cid = $4, parent_uri = $5, parent_cid = $6,
            content = $7, langs = $8, deleted_at = NULL, indexed_at = now()
        WHERE uri = $1
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(uri)
    .bind(cid)
    .bind(root_uri)
    .bind(root_cid)
    .bind(parent_uri)
    .bind(parent_cid)
    .bind(content)
    .bind(langs)
    .fetch_one(&mut **tx)
    .await
    .context("failed to resurrect comment")
}

pub async fn soft_delete(tx: &mut sqlx::Transaction<'_, Postgres>, uri: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE comments SET deleted_at = now() WHERE uri = $1 AND deleted_at IS NULL",
    )
    .bind(uri)
    .execute(&mut **tx)
    .await
    .context("failed to soft-delete comment")?;
    Ok(result.rows_affected() > 0)
}

/// Live child count for `parent_uri = uri` (§4.1.3 forward reconciliation).
pub async fn count_live_children(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    parent_uri: &str,
) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM comments WHERE parent_uri = $1 AND deleted_at IS NULL",
    )
    .bind(parent_uri)
    .fetch_one(&mut **tx)
    .await
    .context("failed to count live children")?;
    Ok(count)
}

pub async fn set_reply_count(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    count: i64,
) -> Result<()> {
    sqlx::query("UPDATE comments SET reply_count = $2 WHERE uri = $1")
        .bind(uri)
        .bind(count)
        .execute(&mut **tx)
        .await
        .context("failed to set comment reply_count")?;
    Ok(())
}

pub async fn increment_reply_count(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    delta: i64,
) -> Result<()> {
    sqlx::query("UPDATE comments SET reply_count = reply_count + $2 WHERE uri = $1")
        .bind(uri)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .context("failed to adjust comment reply_count")?;
    Ok(())
}

pub async fn apply_vote_delta(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    upvote_delta: i64,
    downvote_delta: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE comments SET
            upvote_count = upvote_count + $2,
            downvote_count = downvote_count + $3,
            score = score + $2 - $3
        WHERE uri = $1
        "#,
    )
    .bind(uri)
    .bind(upvote_delta)
    .bind(downvote_delta)
    .execute(&mut **tx)
    .await
    .context("failed to apply vote delta to comment")?;
    Ok(())
}
