//! Handle/DID duality resolver (§4.3): a community has a canonical atProto
//! handle `c-<name>.<instance>` and a UX shorthand `!<name>@<instance>`;
//! both, plus the bare DID, resolve to the same row.

use crate::models::Community;
use crate::store::{communities, DbPool};

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("{0} is not a recognized community identifier form")]
    Unrecognized(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Extracts the bare community `name` from one of the four accepted forms,
/// or returns the raw input unchanged if it's a `did:` string (callers
/// look that up directly rather than by name).
enum Parsed<'a> {
    Did(&'a str),
    Name(&'a str),
}

fn parse(input: &str) -> Result<Parsed<'_>, HandleError> {
    if let Some(rest) = input.strip_prefix("!") {
        let (name, _host) = rest
            .split_once('@')
            .ok_or_else(|| HandleError::Unrecognized(input.to_string()))?;
        return Ok(Parsed::Name(name));
    }
    if let Some(rest) = input.strip_prefix("@c-") {
        let name = rest.split('.').next().unwrap_or(rest);
        return Ok(Parsed::Name(name));
    }
    if let Some(rest) = input.strip_prefix("c-") {
        let name = rest.split('.').next().unwrap_or(rest);
        return Ok(Parsed::Name(name));
    }
    if input.starts_with("did:") {
        return Ok(Parsed::Did(input));
    }
    Err(HandleError::Unrecognized(input.to_string()))
}

/// Resolves any of `did:…`, `@c-name.host`, `c-name.host`, `!name@host` to
/// the matching [`Community`], or `Ok(None)` if none exists.
pub async fn resolve_community_handle(
    pool: &DbPool,
    input: &str,
) -> Result<Option<Community>, HandleError> {
    match parse(input)? {
        Parsed::Did(did) => Ok(communities::get_by_did(pool, did).await?),
        Parsed::Name(name) => Ok(communities::get_by_name(pool, name).await?),
    }
}

pub fn canonical_handle(name: &str, instance_host: &str) -> String {
    format!("c-{name}.{instance_host}")
}

pub fn ux_handle(name: &str, instance_host: &str) -> String {
    format!("!{name}@{instance_host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bang_form() {
        assert!(matches!(parse("!rustlang@coves.social"), Ok(Parsed::Name("rustlang"))));
    }

    #[test]
    fn parses_at_c_form() {
        assert!(matches!(parse("@c-rustlang.coves.social"), Ok(Parsed::Name("rustlang"))));
    }

    #[test]
    fn parses_bare_canonical_form() {
        assert!(matches!(parse("c-rustlang.coves.social"), Ok(Parsed::Name("rustlang"))));
    }

    #[test]
    fn parses_did_form() {
        assert!(matches!(parse("did:plc:abc123"), Ok(Parsed::Did("did:plc:abc123"))));
    }

    #[test]
    fn rejects_unrecognized_form() {
        assert!(parse("rustlang").is_err());
    }

    #[test]
    fn canonical_and_ux_handles_share_the_name() {
        assert_eq!(canonical_handle("rustlang", "coves.social"), "c-rustlang.coves.social");
        assert_eq!(ux_handle("rustlang", "coves.social"), "!rustlang@coves.social");
    }
}
