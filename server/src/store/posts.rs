use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Postgres;

use crate::feed::{SortMode, Timeframe};
use crate::models::Post;

use super::DbPool;

const SELECT_COLUMNS: &str = r#"
    uri, cid, rkey, author_did, community_did, title, content, embed, labels,
    score, upvote_count, downvote_count, comment_count, created_at, indexed_at, deleted_at
"#;

pub async fn get_by_uri(pool: &DbPool, uri: &str) -> Result<Option<Post>> {
    sqlx::query_as::<_, Post>(&format!("SELECT {SELECT_COLUMNS} FROM posts WHERE uri = $1"))
        .bind(uri)
        .fetch_optional(pool)
        .await
        .context("failed to fetch post")
}

/// Locks and returns the post row for update within an open transaction,
/// including soft-deleted rows (needed for resurrection, §4.1.2).
pub async fn get_for_update(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
) -> Result<Option<Post>> {
    sqlx::query_as::<_, Post>(&format!(
        "SELECT {SELECT_COLUMNS} FROM posts WHERE uri = $1 FOR UPDATE"
    ))
    .bind(uri)
    .fetch_optional(&mut **tx)
    .await
    .context("failed to lock post for update")
}

pub struct NewPost<'a> {
    pub uri: &'a str,
    pub cid: &'a str,
    pub rkey: &'a str,
    pub author_did: &'a str,
    pub community_did: &'a str,
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub embed: Option<&'a Value>,
    pub labels: Option<&'a Value>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(tx: &mut sqlx::Transaction<'_, Postgres>, new: NewPost<'_>) -> Result<Post> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        INSERT INTO posts (
            uri, cid, rkey, author_did, community_did, title, content, embed, labels,
            score, upvote_count, downvote_count, comment_count, created_at, indexed_at, deleted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, 0, 0, $10, now(), NULL)
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(new.uri)
    .bind(new.cid)
    .bind(new.rkey)
    .bind(new.author_did)
    .bind(new.community_did)
    .bind(new.title)
    .bind(new.content)
    .bind(new.embed)
    .bind(new.labels)
    .bind(new.created_at)
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert post")
}

/// Resurrection (§4.1.2): clears `deleted_at` and replaces mutable fields,
/// preserving counters (the caller separately re-increments community
/// `post_count`).
pub async fn resurrect(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    cid: &str,
    title: Option<&str>,
    content: Option<&str>,
    embed: Option<&Value>,
    labels: Option<&Value>,
) -> Result<Post> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        UPDATE posts SET
            cid = $2, title = $3, content = $4, embed = $5, labels = $6,
            deleted_at = NULL, indexed_at = now()
        WHERE uri = $1
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(uri)
    .bind(cid)
    .bind(title)
    .bind(content)
    .bind(embed)
    .bind(labels)
    .fetch_one(&mut **tx)
    .await
    .context("failed to resurrect post")
}

/// `update` commit (§4.1.2): content/embed/title/labels + CID, counters
/// and community/author untouched.
pub async fn update_content(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    cid: &str,
    title: Option<&str>,
    content: Option<&str>,
    embed: Option<&Value>,
    labels: Option<&Value>,
) -> Result<Post> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        UPDATE posts SET cid = $2, title = $3, content = $4, embed = $5, labels = $6
        WHERE uri = $1
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(uri)
    .bind(cid)
    .bind(title)
    .bind(content)
    .bind(embed)
    .bind(labels)
    .fetch_one(&mut **tx)
    .await
    .context("failed to update post content")
}

/// Soft-delete, idempotent: re-deleting an already-deleted row is a no-op
/// and returns `false` so the caller does not double-decrement counters.
pub async fn soft_delete(tx: &mut sqlx::Transaction<'_, Postgres>, uri: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE posts SET deleted_at = now() WHERE uri = $1 AND deleted_at IS NULL",
    )
    .bind(uri)
    .execute(&mut **tx)
    .await
    .context("failed to soft-delete post")?;
    Ok(result.rows_affected() > 0)
}

pub async fn apply_vote_delta(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    upvote_delta: i64,
    downvote_delta: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts SET
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
    .context("failed to apply vote delta to post")?;
    Ok(())
}

pub async fn set_comment_count(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    count: i64,
) -> Result<()> {
    sqlx::query("UPDATE posts SET comment_count = $2 WHERE uri = $1")
        .bind(uri)
        .bind(count)
        .execute(&mut **tx)
        .await
        .context("failed to set post comment_count")?;
    Ok(())
}

pub async fn increment_comment_count(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    uri: &str,
    delta: i64,
) -> Result<()> {
    sqlx::query("UPDATE posts SET comment_count = comment_count + $2 WHERE uri = $1")
        .bind(uri)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .context("failed to adjust post comment_count")?;
    Ok(())
}

/// Post count for `getProfile` stats (§6) — live posts only.
pub async fn count_by_author(pool: &DbPool, author_did: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_did = $1 AND deleted_at IS NULL")
            .bind(author_did)
            .fetch_one(pool)
            .await
            .context("failed to count posts by author")?;
    Ok(count)
}

/// Scope a feed query operates over (§4.2): at most one of `community_did`,
/// `subscribed_communities`, `author_did` is expected to be set by callers.
pub struct PostFilter<'a> {
    pub community_did: Option<&'a str>,
    pub subscribed_communities: Option<&'a [String]>,
    pub author_did: Option<&'a str>,
    pub media_only: bool,
    pub sort: SortMode,
    pub timeframe: Timeframe,
    pub cursor: Option<&'a crate::feed::cursor::DecodedCursor>,
    pub limit: i64,
}

/// `ListPostsByFilter` (§4.4): the single shared query primitive behind
/// `getTimeline`, `getCommunity`, and `getAuthorPosts`.
pub async fn list_by_filter(pool: &DbPool, filter: PostFilter<'_>) -> Result<Vec<Post>> {
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM posts WHERE deleted_at IS NULL");
    let mut arg_idx = 1;
    let mut binds: Vec<Bind> = Vec::new();

    if let Some(community_did) = filter.community_did {
        arg_idx += 1;
        sql.push_str(&format!(" AND community_did = ${arg_idx}"));
        binds.push(Bind::Str(community_did.to_string()));
    }
    if let Some(communities) = filter.subscribed_communities {
        arg_idx += 1;
        sql.push_str(&format!(" AND community_did = ANY(${arg_idx})"));
        binds.push(Bind::StrArray(communities.to_vec()));
    }
    if let Some(author_did) = filter.author_did {
        arg_idx += 1;
        sql.push_str(&format!(" AND author_did = ${arg_idx}"));
        binds.push(Bind::Str(author_did.to_string()));
    }
    if filter.media_only {
        sql.push_str(" AND embed IS NOT NULL");
    }
    if let SortMode::Top = filter.sort {
        if let Some(since) = filter.timeframe.since(Utc::now()) {
            arg_idx += 1;
            sql.push_str(&format!(" AND created_at >= ${arg_idx}"));
            binds.push(Bind::Time(since));
        }
    }

    if let Some(cursor) = filter.cursor {
        arg_idx += 1;
        let uri_idx = arg_idx;
        binds.push(Bind::Str(cursor.uri.clone()));
        match filter.sort {
            SortMode::New => {
                arg_idx += 1;
                let ts_idx = arg_idx;
                binds.push(Bind::Time(cursor.timestamp_key()?));
                sql.push_str(&format!(
                    " AND (created_at < ${ts_idx} OR (created_at = ${ts_idx} AND uri > ${uri_idx}))"
                ));
            }
            SortMode::Top => {
                arg_idx += 1;
                let score_idx = arg_idx;
                arg_idx += 1;
                let ts_idx = arg_idx;
                binds.push(Bind::I64(cursor.score_key()?));
                binds.push(Bind::Time(cursor.timestamp_key()?));
                sql.push_str(&format!(
                    " AND (score < ${score_idx} OR (score = ${score_idx} AND (created_at < ${ts_idx} OR (created_at = ${ts_idx} AND uri > ${uri_idx}))))"
                ));
            }
            SortMode::Hot => {
                // hot_rank is computed, not stored: filter client-side after
                // fetching a superset ordered by the same (created_at, uri)
                // tie-break key; the dispatcher-facing API hides this.
            }
        }
    }

    match filter.sort {
        SortMode::New => sql.push_str(" ORDER BY created_at DESC, uri ASC"),
        SortMode::Top => sql.push_str(" ORDER BY score DESC, created_at DESC, uri ASC"),
        SortMode::Hot => sql.push_str(" ORDER BY created_at DESC, uri ASC"),
    }

    arg_idx += 1;
    let limit_idx = arg_idx;
    sql.push_str(&format!(" LIMIT ${limit_idx}"));

    let mut query = sqlx::query_as::<_, Post>(&sql);
    for bind in binds {
        query = match bind {
            Bind::Str(s) => query.bind(s),
            Bind::StrArray(v) => query.bind(v),
            Bind::Time(t) => query.bind(t),
            Bind::I64(n) => query.bind(n),
        };
    }
    // `hot` over-fetches so the caller can rank + re-paginate by hot_rank in memory.
    let effective_limit = if matches!(filter.sort, SortMode::Hot) {
        (filter.limit * 8).max(200)
    } else {
        filter.limit
    };
    query = query.bind(effective_limit);

    query.fetch_all(pool).await.context("failed to list posts")
}

enum Bind {
    Str(String),
    StrArray(Vec<String>),
    Time(DateTime<Utc>),
    I64(i64),
}
