//! Vote consumer (§4.1.4). At most one live vote per (voter, subject);
//! flipping direction is a delete-then-create within the same transaction.

use crate::firehose::{CommitEvent, Operation};
use crate::models::{Direction, is_valid_did};
use crate::store::{comments, posts, votes};

use super::{ConsumeError, ConsumeOutcome};

pub async fn handle(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
) -> Result<ConsumeOutcome, ConsumeError> {
    if !is_valid_did(&event.repo_did) {
        return Err(ConsumeError::InvalidEvent("invalid voter DID".into()));
    }
    let uri = event.uri();

    match event.operation {
        Operation::Delete => handle_delete(pool, &uri).await,
        Operation::Create => handle_create(pool, event, &uri).await,
        Operation::Update => Err(ConsumeError::InvalidEvent("votes are immutable, no update op".into())),
    }
}

async fn handle_delete(pool: &crate::store::DbPool, uri: &str) -> Result<ConsumeOutcome, ConsumeError> {
    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;
    let Some(vote) = votes::get_by_uri(&mut tx, uri).await.map_err(anyhow::Error::from)? else {
        return Ok(ConsumeOutcome::Ignored);
    };
    votes::delete(&mut tx, uri).await.map_err(anyhow::Error::from)?;
    reverse_delta(&mut tx, &vote.subject_uri, vote.direction).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;
    Ok(ConsumeOutcome::Deleted)
}

async fn handle_create(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
    uri: &str,
) -> Result<ConsumeOutcome, ConsumeError> {
    let record = event
        .record
        .as_ref()
        .ok_or_else(|| ConsumeError::InvalidEvent("vote record missing".into()))?;
    let cid = event
        .cid
        .as_deref()
        .ok_or_else(|| ConsumeError::InvalidEvent("vote cid missing".into()))?;
    let subject_uri = record
        .get("subject")
        .and_then(|s| s.get("uri"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConsumeError::InvalidEvent("vote missing subject.uri".into()))?;
    let subject_cid = record
        .get("subject")
        .and_then(|s| s.get("cid"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConsumeError::InvalidEvent("vote missing subject.cid".into()))?;
    let direction = match record.get("direction").and_then(|v| v.as_str()) {
        Some("up") => Direction::Up,
        Some("down") => Direction::Down,
        _ => return Err(ConsumeError::InvalidEvent("vote direction must be up/down".into())),
    };
    let created_at = record
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(chrono::Utc::now);

    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;

    if let Some(existing) = votes::get_live_for_update(&mut tx, &event.repo_did, subject_uri)
        .await
        .map_err(anyhow::Error::from)?
    {
        if existing.direction == direction {
            // Same (voter, subject, direction) replayed: idempotent no-op.
            tx.commit().await.map_err(anyhow::Error::from)?;
            return Ok(ConsumeOutcome::Ignored);
        }
        // Direction flip: reverse the old contribution before applying the new one.
        votes::delete(&mut tx, &existing.uri).await.map_err(anyhow::Error::from)?;
        reverse_delta(&mut tx, subject_uri, existing.direction).await?;
    }

    votes::insert(
        &mut tx,
        uri,
        cid,
        &event.rkey,
        &event.repo_did,
        subject_uri,
        subject_cid,
        direction,
        created_at,
    )
    .await
    .map_err(anyhow::Error::from)?;
    apply_delta(&mut tx, subject_uri, direction).await?;

    tx.commit().await.map_err(anyhow::Error::from)?;
    Ok(ConsumeOutcome::Indexed)
}

async fn apply_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    subject_uri: &str,
    direction: Direction,
) -> Result<(), ConsumeError> {
    let (up, down) = match direction {
        Direction::Up => (1, 0),
        Direction::Down => (0, 1),
    };
    apply_subject_delta(tx, subject_uri, up, down).await
}

async fn reverse_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    subject_uri: &str,
    direction: Direction,
) -> Result<(), ConsumeError> {
    let (up, down) = match direction {
        Direction::Up => (-1, 0),
        Direction::Down => (0, -1),
    };
    apply_subject_delta(tx, subject_uri, up, down).await
}

/// Subjects are either posts or comments; an unindexed subject (e.g. the
/// vote arrived before the post did) is left alone — its counters start
/// at zero and the vote row itself still records the voter's intent.
async fn apply_subject_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    subject_uri: &str,
    upvote_delta: i64,
    downvote_delta: i64,
) -> Result<(), ConsumeError> {
    if posts::get_for_update(tx, subject_uri).await.map_err(anyhow::Error::from)?.is_some() {
        posts::apply_vote_delta(tx, subject_uri, upvote_delta, downvote_delta)
            .await
            .map_err(anyhow::Error::from)?;
    } else if comments::get_for_update(tx, subject_uri).await.map_err(anyhow::Error::from)?.is_some() {
        comments::apply_vote_delta(tx, subject_uri, upvote_delta, downvote_delta)
            .await
            .map_err(anyhow::Error::from)?;
    }
    Ok(())
}
