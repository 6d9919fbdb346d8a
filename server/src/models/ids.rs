//! Validated identifier newtypes shared across the store, consumers and feed engine.
//!
//! DIDs, AT-URIs and CIDs are kept as validated `String` wrappers rather than a
//! third-party typed-URI crate, following the pattern PDS implementations in this
//! ecosystem use for the same identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),
    #[error("invalid AT-URI: {0}")]
    InvalidAtUri(String),
    #[error("invalid CID: empty")]
    EmptyCid,
}

/// A decentralized identifier, `did:<method>:<body>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if !is_valid_did(&raw) {
            return Err(IdError::InvalidDid(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = IdError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Did::parse(value)
    }
}

impl From<Did> for String {
    fn from(value: Did) -> Self {
        value.0
    }
}

/// `did:<method>:<body>` where method is lowercase alphanumeric and body is
/// non-empty and contains no whitespace. This is intentionally permissive
/// about method-specific body grammar (e.g. did:plc's base32 charset) since
/// method resolution is delegated to the external identity resolver.
pub fn is_valid_did(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("did:") else {
        return false;
    };
    let mut parts = rest.splitn(2, ':');
    let Some(method) = parts.next() else {
        return false;
    };
    let Some(body) = parts.next() else {
        return false;
    };
    !method.is_empty()
        && method.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && !body.is_empty()
        && !body.chars().any(|c| c.is_whitespace())
}

/// `at://<did>/<collection>/<rkey>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtUri(String);

pub struct AtUriParts<'a> {
    pub did: &'a str,
    pub collection: &'a str,
    pub rkey: &'a str,
}

impl AtUri {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if parse_at_uri(&raw).is_none() {
            return Err(IdError::InvalidAtUri(raw));
        }
        Ok(Self(raw))
    }

    pub fn new(did: &str, collection: &str, rkey: &str) -> Self {
        Self(format!("at://{did}/{collection}/{rkey}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parts(&self) -> AtUriParts<'_> {
        parse_at_uri(&self.0).expect("AtUri invariant: always constructed from a valid URI")
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AtUri {
    type Error = IdError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        AtUri::parse(value)
    }
}

impl From<AtUri> for String {
    fn from(value: AtUri) -> Self {
        value.0
    }
}

/// Returns `Some` with the parsed segments for a syntactically complete
/// `at://<did>/<collection>/<rkey>` URI: non-empty did, collection and rkey.
pub fn parse_at_uri(s: &str) -> Option<AtUriParts<'_>> {
    let rest = s.strip_prefix("at://")?;
    let mut segments = rest.splitn(3, '/');
    let did = segments.next()?;
    let collection = segments.next()?;
    let rkey = segments.next()?;
    if did.is_empty() || collection.is_empty() || rkey.is_empty() || !is_valid_did(did) {
        return None;
    }
    Some(AtUriParts { did, collection, rkey })
}

/// A content identifier. Treated as an opaque non-empty string — this spec
/// does not verify the multihash/multicodec structure (Merkle-proof
/// verification is a non-goal), only that it is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdError::EmptyCid);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Cid {
    type Error = IdError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cid::parse(value)
    }
}

impl From<Cid> for String {
    fn from(value: Cid) -> Self {
        value.0
    }
}

/// DNS-label rules for community names: 1-63 chars, `[A-Za-z0-9]`, interior
/// hyphens only, no leading/trailing hyphen.
pub fn is_valid_community_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') {
        return false;
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_dids() {
        assert!(is_valid_did("did:plc:ewvi7nxzyoun6zhxrhs64oiz"));
        assert!(is_valid_did("did:web:example.com"));
    }

    #[test]
    fn invalid_dids() {
        assert!(!is_valid_did("not-a-did"));
        assert!(!is_valid_did("did:"));
        assert!(!is_valid_did("did:plc:"));
        assert!(!is_valid_did("did:plc: has space"));
    }

    #[test]
    fn at_uri_roundtrip() {
        let uri = AtUri::parse("at://did:plc:abc/social.coves.post/3jui7").unwrap();
        let parts = uri.parts();
        assert_eq!(parts.did, "did:plc:abc");
        assert_eq!(parts.collection, "social.coves.post");
        assert_eq!(parts.rkey, "3jui7");
    }

    #[test]
    fn at_uri_rejects_missing_segments() {
        assert!(AtUri::parse("at://did:plc:abc/social.coves.post").is_err());
        assert!(AtUri::parse("at://did:plc:abc//rkey").is_err());
        assert!(parse_at_uri("at://not-a-did/coll/rkey").is_none());
    }

    #[test]
    fn community_name_validation() {
        assert!(is_valid_community_name("rustlang"));
        assert!(is_valid_community_name("rust-lang"));
        assert!(!is_valid_community_name("-rustlang"));
        assert!(!is_valid_community_name("rustlang-"));
        assert!(!is_valid_community_name(""));
        assert!(!is_valid_community_name(&"a".repeat(64)));
        assert!(is_valid_community_name(&"a".repeat(63)));
    }
}
