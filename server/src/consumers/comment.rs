//! Comment consumer (§4.1.3): validation, forward reconciliation of
//! out-of-order children, threading immutability on update, and
//! resurrection with refs that may rebind.

use chrono::{DateTime, Utc};

use crate::firehose::{CommitEvent, Operation};
use crate::models::{is_valid_did, parse_at_uri, MAX_CONTENT_BYTES};
use crate::store::{comments, posts};

use super::{ConsumeError, ConsumeOutcome};

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

struct ValidatedFields<'a> {
    content: &'a str,
    root_uri: &'a str,
    root_cid: &'a str,
    parent_uri: &'a str,
    parent_cid: &'a str,
    langs: Option<Vec<String>>,
    created_at: DateTime<Utc>,
}

fn validate(event: &CommitEvent, record: &serde_json::Value) -> Result<ValidatedFields<'_>, ConsumeError> {
    if !is_valid_did(&event.repo_did) {
        return Err(ConsumeError::InvalidEvent("invalid commenter DID".into()));
    }
    let content = record
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConsumeError::InvalidEvent("comment content missing".into()))?;
    if content.is_empty() || content.len() > MAX_CONTENT_BYTES {
        return Err(ConsumeError::InvalidEvent(format!(
            "comment content length {} outside (0, {MAX_CONTENT_BYTES}]",
            content.len()
        )));
    }

    let root = record
        .get("root")
        .ok_or_else(|| ConsumeError::InvalidEvent("comment missing root ref".into()))?;
    let parent = record
        .get("parent")
        .ok_or_else(|| ConsumeError::InvalidEvent("comment missing parent ref".into()))?;
    let root_uri = ref_field(root, "uri")?;
    let root_cid = ref_field(root, "cid")?;
    let parent_uri = ref_field(parent, "uri")?;
    let parent_cid = ref_field(parent, "cid")?;

    if parse_at_uri(root_uri).is_none() {
        return Err(ConsumeError::InvalidEvent(format!("root.uri {root_uri} is not a complete AT-URI")));
    }
    if parse_at_uri(parent_uri).is_none() {
        return Err(ConsumeError::InvalidEvent(format!(
            "parent.uri {parent_uri} is not a complete AT-URI"
        )));
    }

    let langs = record
        .get("langs")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());

    let created_at = record
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    Ok(ValidatedFields {
        content,
        root_uri,
        root_cid,
        parent_uri,
        parent_cid,
        langs,
        created_at,
    })
}

fn ref_field<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str, ConsumeError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConsumeError::InvalidEvent(format!("ref.{field} missing or empty")))
}

async fn handle_delete(pool: &crate::store::DbPool, uri: &str) -> Result<ConsumeOutcome, ConsumeError> {
    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;
    let Some(comment) = comments::get_for_update(&mut tx, uri).await.map_err(anyhow::Error::from)? else {
        return Ok(ConsumeOutcome::Ignored);
    };
    let deleted = comments::soft_delete(&mut tx, uri).await.map_err(anyhow::Error::from)?;
    if deleted {
        decrement_parent(&mut tx, &comment.root_uri, &comment.parent_uri).await?;
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
    let record = event
        .record
        .as_ref()
        .ok_or_else(|| ConsumeError::InvalidEvent("comment record missing".into()))?;
    let cid = event
        .cid
        .as_deref()
        .ok_or_else(|| ConsumeError::InvalidEvent("comment cid missing".into()))?;
    let fields = validate(event, record)?;

    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;
    let existing = comments::get_for_update(&mut tx, uri).await.map_err(anyhow::Error::from)?;

    let outcome = match existing {
        Some(row) if row.is_live() => {
            if row.root_uri != fields.root_uri
                || row.root_cid != fields.root_cid
                || row.parent_uri != fields.parent_uri
                || row.parent_cid != fields.parent_cid
            {
                return Err(ConsumeError::ThreadingImmutable);
            }
            comments::update_content(&mut tx, uri, cid, fields.content, fields.langs.as_deref())
                .await
                .map_err(anyhow::Error::from)?;
            ConsumeOutcome::Updated
        }
        Some(_) => {
            // Resurrection (§4.1.3): refs may rebind; deltas apply to the
            // new refs only.
            comments::resurrect(
                &mut tx,
                uri,
                cid,
                fields.root_uri,
                fields.root_cid,
                fields.parent_uri,
                fields.parent_cid,
                fields.content,
                fields.langs.as_deref(),
            )
            .await
            .map_err(anyhow::Error::from)?;
            reconcile_and_increment_parent(&mut tx, uri, fields.root_uri, fields.parent_uri).await?;
            ConsumeOutcome::Resurrected
        }
        None => {
            comments::insert(
                &mut tx,
                comments::NewComment {
                    uri,
                    cid,
                    rkey: &event.rkey,
                    commenter_did: &event.repo_did,
                    root_uri: fields.root_uri,
                    root_cid: fields.root_cid,
                    parent_uri: fields.parent_uri,
                    parent_cid: fields.parent_cid,
                    content: fields.content,
                    langs: fields.langs.as_deref(),
                    created_at: fields.created_at,
                },
            )
            .await
            .map_err(anyhow::Error::from)?;
            reconcile_and_increment_parent(&mut tx, uri, fields.root_uri, fields.parent_uri).await?;
            ConsumeOutcome::Indexed
        }
    };

    tx.commit().await.map_err(anyhow::Error::from)?;
    Ok(outcome)
}

/// Forward reconciliation (§4.1.3): a newly (re)inserted comment may
/// already have children that arrived first — count them and set
/// `reply_count` atomically instead of trusting a running counter that
/// never saw them — then bump the parent's own counter.
async fn reconcile_and_increment_parent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    uri: &str,
    root_uri: &str,
    parent_uri: &str,
) -> Result<(), ConsumeError> {
    let live_children = comments::count_live_children(tx, uri).await.map_err(anyhow::Error::from)?;
    if live_children > 0 {
        crate::metrics::record_reconciliation();
    }
    comments::set_reply_count(tx, uri, live_children)
        .await
        .map_err(anyhow::Error::from)?;
    increment_parent(tx, root_uri, parent_uri, 1).await
}

async fn decrement_parent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    root_uri: &str,
    parent_uri: &str,
) -> Result<(), ConsumeError> {
    increment_parent(tx, root_uri, parent_uri, -1).await
}

/// A comment's parent is either the Post itself (`parent_uri == root_uri`)
/// or another comment. Either way, a parent not yet indexed (out-of-order
/// arrival) is left alone — a later event for that parent will catch up
/// via its own forward reconciliation.
async fn increment_parent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    root_uri: &str,
    parent_uri: &str,
    delta: i64,
) -> Result<(), ConsumeError> {
    if parent_uri == root_uri {
        if posts::get_for_update(tx, parent_uri).await.map_err(anyhow::Error::from)?.is_some() {
            posts::increment_comment_count(tx, parent_uri, delta)
                .await
                .map_err(anyhow::Error::from)?;
        }
    } else if comments::get_for_update(tx, parent_uri).await.map_err(anyhow::Error::from)?.is_some() {
        comments::increment_reply_count(tx, parent_uri, delta)
            .await
            .map_err(anyhow::Error::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firehose::Operation;

    fn comment_event(content: &str, root: (&str, &str), parent: (&str, &str)) -> CommitEvent {
        CommitEvent {
            repo_did: "did:plc:commenter".to_string(),
            rev: "1".into(),
            operation: Operation::Create,
            collection: "social.coves.comment".into(),
            rkey: "abc".into(),
            cid: Some("bafycid".into()),
            record: Some(serde_json::json!({
                "content": content,
                "root": { "uri": root.0, "cid": root.1 },
                "parent": { "uri": parent.0, "cid": parent.1 },
            })),
        }
    }

    #[test]
    fn rejects_empty_content() {
        let event = comment_event(
            "",
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
        );
        let record = event.record.as_ref().unwrap();
        assert!(validate(&event, record).is_err());
    }

    #[test]
    fn rejects_oversized_content() {
        let big = "x".repeat(MAX_CONTENT_BYTES + 1);
        let event = comment_event(
            &big,
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
        );
        let record = event.record.as_ref().unwrap();
        assert!(validate(&event, record).is_err());
    }

    #[test]
    fn rejects_incomplete_parent_uri() {
        let event = comment_event(
            "hello",
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
            ("at://did:plc:a/social.coves.post", "bafy1"),
        );
        let record = event.record.as_ref().unwrap();
        assert!(validate(&event, record).is_err());
    }

    #[test]
    fn accepts_well_formed_comment() {
        let event = comment_event(
            "hello",
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
            ("at://did:plc:a/social.coves.post/1", "bafy1"),
        );
        let record = event.record.as_ref().unwrap();
        let fields = validate(&event, record).unwrap();
        assert_eq!(fields.content, "hello");
    }
}
