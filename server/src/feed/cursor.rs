//! Opaque, HMAC-authenticated pagination cursors (§4.2).
//!
//! A cursor encodes the sort key of the last item on a page plus its `uri`
//! as a tie-breaker, so a client can ask for "the page after this" without
//! the index store needing server-side session state. The payload is
//! base64(json) with an HMAC-SHA256 tag appended; clients must treat the
//! whole thing as opaque.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::SortMode;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("malformed cursor")]
    Malformed,
    #[error("cursor signature invalid")]
    BadSignature,
    #[error("cursor does not match requested sort mode")]
    SortMismatch,
}

/// On-the-wire payload, before signing. `sort_key` is the stringified,
/// full-precision sort key (`created_at` RFC3339 for `new`/`top`'s tie
/// portion, decimal score for `top`, or `hot_rank::format_hot_rank` output
/// for `hot`) — kept as a string so precision survives JSON round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorPayload {
    sort: StoredSortMode,
    uri: String,
    sort_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_key: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum StoredSortMode {
    New,
    Top,
    Hot,
}

impl From<SortMode> for StoredSortMode {
    fn from(s: SortMode) -> Self {
        match s {
            SortMode::New => StoredSortMode::New,
            SortMode::Top => StoredSortMode::Top,
            SortMode::Hot => StoredSortMode::Hot,
        }
    }
}

/// A cursor decoded and signature-verified, ready for use as a pagination
/// predicate (§4.4's `ListPostsByFilter`/`ListCommentsByFilter`).
#[derive(Debug, Clone)]
pub struct DecodedCursor {
    pub sort: SortMode,
    pub uri: String,
    sort_key: String,
    score_key: Option<i64>,
}

impl DecodedCursor {
    /// The `created_at` component of the sort key, for `new` and the tie
    /// portion of `top`/`hot`.
    pub fn timestamp_key(&self) -> anyhow::Result<DateTime<Utc>> {
        self.sort_key
            .parse::<DateTime<Utc>>()
            .map_err(|_| CursorError::Malformed.into())
    }

    /// The `score` component, only present for `top` cursors.
    pub fn score_key(&self) -> anyhow::Result<i64> {
        self.score_key.ok_or_else(|| CursorError::SortMismatch.into())
    }

    /// The `hot_rank` component, only present for `hot` cursors.
    pub fn hot_rank_key(&self) -> anyhow::Result<f64> {
        super::hot_rank::parse_hot_rank(&self.sort_key)
            .ok_or_else(|| CursorError::Malformed.into())
    }
}

pub fn encode(
    secret: &[u8],
    sort: SortMode,
    uri: &str,
    sort_key: &str,
    score_key: Option<i64>,
) -> String {
    let payload = CursorPayload {
        sort: sort.into(),
        uri: uri.to_string(),
        sort_key: sort_key.to_string(),
        score_key,
    };
    let json = serde_json::to_vec(&payload).expect("cursor payload always serializes");
    let tag = sign(secret, &json);
    let mut framed = Vec::with_capacity(json.len() + tag.len() + 4);
    framed.extend_from_slice(&(json.len() as u32).to_be_bytes());
    framed.extend_from_slice(&json);
    framed.extend_from_slice(&tag);
    URL_SAFE_NO_PAD.encode(framed)
}

pub fn decode(secret: &[u8], expected_sort: SortMode, token: &str) -> Result<DecodedCursor, CursorError> {
    let framed = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CursorError::Malformed)?;
    if framed.len() < 4 {
        return Err(CursorError::Malformed);
    }
    let len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
    if framed.len() < 4 + len {
        return Err(CursorError::Malformed);
    }
    let json = &framed[4..4 + len];
    let tag = &framed[4 + len..];
    let expected_tag = sign(secret, json);
    if tag.len() != expected_tag.len() || !constant_time_eq(tag, &expected_tag) {
        return Err(CursorError::BadSignature);
    }
    let payload: CursorPayload = serde_json::from_slice(json).map_err(|_| CursorError::Malformed)?;
    if payload.sort != expected_sort.into() {
        return Err(CursorError::SortMismatch);
    }
    Ok(DecodedCursor {
        sort: expected_sort,
        uri: payload.uri,
        sort_key: payload.sort_key,
        score_key: payload.score_key,
    })
}

fn sign(secret: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_new_cursor() {
        let secret = b"test-secret-key-material-32bytes";
        let token = encode(
            secret,
            SortMode::New,
            "at://did:plc:abc/social.coves.post/1",
            "2026-01-01T00:00:00Z",
            None,
        );
        let decoded = decode(secret, SortMode::New, &token).unwrap();
        assert_eq!(decoded.uri, "at://did:plc:abc/social.coves.post/1");
        assert_eq!(
            decoded.timestamp_key().unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn rejects_tampered_cursor() {
        let secret = b"test-secret-key-material-32bytes";
        let token = encode(secret, SortMode::New, "at://x/y/1", "2026-01-01T00:00:00Z", None);
        let mut tampered = token.clone();
        tampered.push('A');
        assert!(matches!(
            decode(secret, SortMode::New, &tampered),
            Err(CursorError::Malformed) | Err(CursorError::BadSignature)
        ));
    }

    #[test]
    fn rejects_sort_mode_mismatch() {
        let secret = b"test-secret-key-material-32bytes";
        let token = encode(secret, SortMode::New, "at://x/y/1", "2026-01-01T00:00:00Z", None);
        assert!(matches!(
            decode(secret, SortMode::Top, &token),
            Err(CursorError::SortMismatch)
        ));
    }

    #[test]
    fn top_cursor_carries_score_key() {
        let secret = b"another-test-secret-material-ok";
        let token = encode(secret, SortMode::Top, "at://x/y/1", "2026-01-01T00:00:00Z", Some(42));
        let decoded = decode(secret, SortMode::Top, &token).unwrap();
        assert_eq!(decoded.score_key().unwrap(), 42);
    }

    #[test]
    fn hot_cursor_preserves_full_precision_rank() {
        let secret = b"another-test-secret-material-ok";
        let rank = super::super::hot_rank::hot_rank(17, Utc::now());
        let formatted = super::super::hot_rank::format_hot_rank(rank);
        let token = encode(secret, SortMode::Hot, "at://x/y/1", &formatted, None);
        let decoded = decode(secret, SortMode::Hot, &token).unwrap();
        assert_eq!(decoded.hot_rank_key().unwrap(), rank);
    }
}
