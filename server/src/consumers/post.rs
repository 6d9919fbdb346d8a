//! Post consumer (§4.1.2).

use chrono::{DateTime, Utc};

use crate::firehose::{CommitEvent, Operation};
use crate::models::is_valid_did;
use crate::store::{aggregators, communities, posts};

use super::{aggregator_post, ConsumeError, ConsumeOutcome};

pub async fn handle(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
) -> Result<ConsumeOutcome, ConsumeError> {
    let uri = event.uri();

    match event.operation {
        Operation::Delete => handle_delete(pool, &uri).await,
        Operation::Create | Operation::Update => handle_upsert(pool, event, &uri).await,
    }
}

async fn handle_delete(pool: &crate::store::DbPool, uri: &str) -> Result<ConsumeOutcome, ConsumeError> {
    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;
    let Some(post) = posts::get_for_update(&mut tx, uri).await.map_err(anyhow::Error::from)? else {
        return Ok(ConsumeOutcome::Ignored);
    };
    let deleted = posts::soft_delete(&mut tx, uri).await.map_err(anyhow::Error::from)?;
    if deleted {
        communities::increment_post_count(&mut tx, &post.community_did, -1)
            .await
            .map_err(anyhow::Error::from)?;
    }
    tx.commit().await.map_err(anyhow::Error::from)?;
    Ok(if deleted {
        ConsumeOutcome::Deleted
    } else {
        ConsumeOutcome::Ignored
    })
}

async fn handle_upsert(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
    uri: &str,
) -> Result<ConsumeOutcome, ConsumeError> {
    if !is_valid_did(&event.repo_did) {
        return Err(ConsumeError::InvalidEvent("invalid author DID".into()));
    }
    let record = event
        .record
        .as_ref()
        .ok_or_else(|| ConsumeError::InvalidEvent("post record missing".into()))?;
    let cid = event
        .cid
        .as_deref()
        .ok_or_else(|| ConsumeError::InvalidEvent("post cid missing".into()))?;
    let community_did = record
        .get("community")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConsumeError::InvalidEvent("post missing community".into()))?;
    let title = record.get("title").and_then(|v| v.as_str());
    let content = record.get("content").and_then(|v| v.as_str());
    let embed = record.get("embed");
    let labels = record.get("labels");
    let created_at = record
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    if communities::get_by_did(pool, community_did)
        .await
        .map_err(anyhow::Error::from)?
        .is_none()
    {
        return Err(ConsumeError::InvalidEvent(format!(
            "community {community_did} does not exist"
        )));
    }

    // A DID only participates in §4.1.6's authorize-and-rate-limit path if
    // it is registered as an aggregator; ordinary user posts skip it.
    let aggregator = aggregators::get(pool, &event.repo_did).await.map_err(anyhow::Error::from)?;
    if aggregator.is_some() {
        aggregator_post::check_authorized(pool, &event.repo_did, community_did).await?;
    }

    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;

    if aggregator.is_some() {
        aggregator_post::check_rate_limit(&mut tx, &event.repo_did, community_did, Utc::now()).await?;
    }

    let existing = posts::get_for_update(&mut tx, uri).await.map_err(anyhow::Error::from)?;

    let outcome = match existing {
        Some(row) if row.is_live() => {
            if matches!(event.operation, Operation::Create) {
                return Err(ConsumeError::AlreadyIndexed);
            }
            posts::update_content(&mut tx, uri, cid, title, content, embed, labels)
                .await
                .map_err(anyhow::Error::from)?;
            ConsumeOutcome::Updated
        }
        Some(_) => {
            // Resurrection (§4.1.2): a soft-deleted rkey is revived.
            posts::resurrect(&mut tx, uri, cid, title, content, embed, labels)
                .await
                .map_err(anyhow::Error::from)?;
            communities::increment_post_count(&mut tx, community_did, 1)
                .await
                .map_err(anyhow::Error::from)?;
            ConsumeOutcome::Resurrected
        }
        None => {
            posts::insert(
                &mut tx,
                posts::NewPost {
                    uri,
                    cid,
                    rkey: &event.rkey,
                    author_did: &event.repo_did,
                    community_did,
                    title,
                    content,
                    embed,
                    labels,
                    created_at,
                },
            )
            .await
            .map_err(anyhow::Error::from)?;
            communities::increment_post_count(&mut tx, community_did, 1)
                .await
                .map_err(anyhow::Error::from)?;
            ConsumeOutcome::Indexed
        }
    };

    if aggregator.is_some() && matches!(outcome, ConsumeOutcome::Indexed) {
        aggregator_post::append_ledger_entry(&mut tx, &event.repo_did, community_did, uri, cid, Utc::now())
            .await?;
    }

    tx.commit().await.map_err(anyhow::Error::from)?;
    Ok(outcome)
}
