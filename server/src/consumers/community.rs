//! Community-side consumers (§4.1.5): profile edits, blocks, aggregator
//! authorizations. None of these touch credentials or ownership — those
//! are core-authored writes, never firehose-driven.

use crate::firehose::{CommitEvent, Operation};
use crate::store::{aggregators, blocks, communities};

use super::{ConsumeError, ConsumeOutcome};

pub async fn handle_profile(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
) -> Result<ConsumeOutcome, ConsumeError> {
    match event.operation {
        Operation::Delete => Ok(ConsumeOutcome::Ignored),
        Operation::Create | Operation::Update => {
            let record = event
                .record
                .as_ref()
                .ok_or_else(|| ConsumeError::InvalidEvent("community profile record missing".into()))?;
            let display_name = record
                .get("displayName")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConsumeError::InvalidEvent("community profile missing displayName".into()))?;
            let description = record.get("description").and_then(|v| v.as_str());

            let updated = communities::update_profile(pool, &event.repo_did, display_name, description)
                .await
                .map_err(anyhow::Error::from)?;
            Ok(if updated.is_some() {
                ConsumeOutcome::Updated
            } else {
                ConsumeOutcome::Ignored
            })
        }
    }
}

pub async fn handle_block(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
) -> Result<ConsumeOutcome, ConsumeError> {
    match event.operation {
        Operation::Delete => {
            // Block records are authored under the blocking user's own repo
            // and name the community as subject; the rkey alone doesn't
            // carry the community DID, so deletes are matched by the
            // record payload the firehose still has for a `delete` only
            // when the relay includes the prior value — otherwise this is
            // a no-op and the eventual reconciliation sweep catches it.
            Ok(ConsumeOutcome::Ignored)
        }
        Operation::Create => {
            let record = event
                .record
                .as_ref()
                .ok_or_else(|| ConsumeError::InvalidEvent("block record missing".into()))?;
            let community_did = record
                .get("community")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConsumeError::InvalidEvent("block missing community".into()))?;
            blocks::upsert(pool, &event.repo_did, community_did, &event.uri(), event.cid.as_deref().unwrap_or(""))
                .await
                .map_err(anyhow::Error::from)?;
            Ok(ConsumeOutcome::Indexed)
        }
        Operation::Update => Err(ConsumeError::InvalidEvent("blocks have no update op".into())),
    }
}

pub async fn handle_authorization(
    pool: &crate::store::DbPool,
    event: &CommitEvent,
) -> Result<ConsumeOutcome, ConsumeError> {
    match event.operation {
        Operation::Delete => Ok(ConsumeOutcome::Ignored),
        Operation::Create | Operation::Update => {
            let record = event
                .record
                .as_ref()
                .ok_or_else(|| ConsumeError::InvalidEvent("authorization record missing".into()))?;
            let aggregator_did = record
                .get("aggregator")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConsumeError::InvalidEvent("authorization missing aggregator".into()))?;
            let community_did = &event.repo_did;
            let enabled = record.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);
            let config = record.get("config").cloned().unwrap_or(serde_json::json!({}));
            let created_by = record
                .get("createdBy")
                .and_then(|v| v.as_str())
                .unwrap_or(community_did);
            let disabled_by = if enabled {
                None
            } else {
                record.get("disabledBy").and_then(|v| v.as_str())
            };

            aggregators::upsert_authorization(
                pool,
                aggregator_did,
                community_did,
                enabled,
                &config,
                created_by,
                disabled_by,
                &event.uri(),
                event.cid.as_deref().unwrap_or(""),
            )
            .await
            .map_err(anyhow::Error::from)?;
            Ok(ConsumeOutcome::Indexed)
        }
    }
}
