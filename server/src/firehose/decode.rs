//! DAG-CBOR record decoding. The frame envelope and the record payload it
//! carries are decoded in two passes: the envelope is plain JSON/CBOR
//! structure, the record bytes inside `commit.record` are themselves
//! DAG-CBOR and are decoded via `ipld-core`'s dynamic `Ipld` value, then
//! converted to `serde_json::Value` for consumers to read typed fields
//! out of with ordinary `serde_json` accessors.

use ipld_core::ipld::Ipld;
use thiserror::Error;

use crate::models::is_valid_did;

use super::{CommitEvent, FirehoseFrame, FrameKind, Operation, RawCommit};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed commit record bytes: {0}")]
    MalformedRecord(String),
    #[error("missing cid/record for create/update")]
    MissingPayload,
    #[error("cid/record present for delete")]
    UnexpectedPayload,
    #[error("invalid repo DID: {0}")]
    InvalidDid(String),
    #[error("record $type {actual} does not match collection {expected}")]
    TypeMismatch { expected: String, actual: String },
    #[error("not a commit frame")]
    NotACommit,
}

/// Turns a raw network frame into a validated `CommitEvent`, applying the
/// §4.1 common preconditions (1)-(3). Precondition (4), URI reconstruction,
/// is exposed as `CommitEvent::uri`.
pub fn decode_commit(frame: FirehoseFrame) -> Result<CommitEvent, DecodeError> {
    if frame.kind != FrameKind::Commit {
        return Err(DecodeError::NotACommit);
    }
    let commit: RawCommit = frame.commit.ok_or(DecodeError::NotACommit)?;

    if !is_valid_did(&frame.did) {
        return Err(DecodeError::InvalidDid(frame.did));
    }

    let record = match commit.operation {
        Operation::Create | Operation::Update => {
            let cid = commit.cid.as_ref().ok_or(DecodeError::MissingPayload)?;
            if cid.is_empty() {
                return Err(DecodeError::MissingPayload);
            }
            let bytes = commit.record.as_deref().ok_or(DecodeError::MissingPayload)?;
            Some(decode_record_bytes(bytes)?)
        }
        Operation::Delete => {
            if commit.cid.is_some() || commit.record.is_some() {
                return Err(DecodeError::UnexpectedPayload);
            }
            None
        }
    };

    if let Some(value) = &record {
        if let Some(declared_type) = value.get("$type").and_then(|t| t.as_str()) {
            if declared_type != commit.collection {
                return Err(DecodeError::TypeMismatch {
                    expected: commit.collection,
                    actual: declared_type.to_string(),
                });
            }
        }
    }

    Ok(CommitEvent {
        repo_did: frame.did,
        rev: commit.rev,
        operation: commit.operation,
        collection: commit.collection,
        rkey: commit.rkey,
        cid: commit.cid,
        record,
    })
}

fn decode_record_bytes(bytes: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let ipld: Ipld =
        serde_ipld_dagcbor::from_slice(bytes).map_err(|e| DecodeError::MalformedRecord(e.to_string()))?;
    serde_json::to_value(ipld_to_json(ipld)).map_err(|e| DecodeError::MalformedRecord(e.to_string()))
}

/// `Ipld` doesn't implement `serde::Serialize` into a shape `serde_json`
/// accepts directly for every variant (bytes/links need a textual
/// representation), so this walks the tree explicitly.
fn ipld_to_json(ipld: Ipld) -> serde_json::Value {
    use serde_json::Value;
    match ipld {
        Ipld::Null => Value::Null,
        Ipld::Bool(b) => Value::Bool(b),
        Ipld::Integer(i) => serde_json::json!(i),
        Ipld::Float(f) => serde_json::json!(f),
        Ipld::String(s) => Value::String(s),
        Ipld::Bytes(b) => Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        Ipld::List(items) => Value::Array(items.into_iter().map(ipld_to_json).collect()),
        Ipld::Map(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, ipld_to_json(v))).collect())
        }
        Ipld::Link(cid) => Value::String(cid.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: FrameKind, commit: Option<RawCommit>) -> FirehoseFrame {
        FirehoseFrame {
            seq: 1,
            did: "did:plc:abc123".to_string(),
            kind,
            time_us: 0,
            commit,
            identity: None,
        }
    }

    #[test]
    fn rejects_non_commit_frames() {
        let f = frame(FrameKind::Identity, None);
        assert!(matches!(decode_commit(f), Err(DecodeError::NotACommit)));
    }

    #[test]
    fn rejects_invalid_repo_did() {
        let mut f = frame(
            FrameKind::Commit,
            Some(RawCommit {
                rev: "1".into(),
                operation: Operation::Delete,
                collection: "social.coves.post".into(),
                rkey: "a".into(),
                cid: None,
                record: None,
            }),
        );
        f.did = "not-a-did".to_string();
        assert!(matches!(decode_commit(f), Err(DecodeError::InvalidDid(_))));
    }

    #[test]
    fn rejects_delete_with_payload() {
        let f = frame(
            FrameKind::Commit,
            Some(RawCommit {
                rev: "1".into(),
                operation: Operation::Delete,
                collection: "social.coves.post".into(),
                rkey: "a".into(),
                cid: Some("bafy".into()),
                record: None,
            }),
        );
        assert!(matches!(decode_commit(f), Err(DecodeError::UnexpectedPayload)));
    }

    #[test]
    fn rejects_create_missing_record() {
        let f = frame(
            FrameKind::Commit,
            Some(RawCommit {
                rev: "1".into(),
                operation: Operation::Create,
                collection: "social.coves.post".into(),
                rkey: "a".into(),
                cid: Some("bafy".into()),
                record: None,
            }),
        );
        assert!(matches!(decode_commit(f), Err(DecodeError::MissingPayload)));
    }

    #[test]
    fn accepts_valid_delete() {
        let f = frame(
            FrameKind::Commit,
            Some(RawCommit {
                rev: "1".into(),
                operation: Operation::Delete,
                collection: "social.coves.post".into(),
                rkey: "a".into(),
                cid: None,
                record: None,
            }),
        );
        let event = decode_commit(f).unwrap();
        assert_eq!(event.uri(), "at://did:plc:abc123/social.coves.post/a");
    }
}
