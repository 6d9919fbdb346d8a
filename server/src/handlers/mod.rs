//! One file per XRPC operation (§6), matching the teacher's
//! `handlers/<verb>.rs` convention.

pub mod create_community;
pub mod create_community_post;
pub mod get_community_feed;
pub mod get_posts;
pub mod get_profile;
pub mod get_timeline;
pub mod grant_aggregator_authorization;
pub mod view;

use crate::error::AppError;
use crate::feed::{cursor, SortMode};

/// Decodes a page cursor against the sort mode the caller requested,
/// mapping any failure to the wire `InvalidCursor` error (§6).
pub(crate) fn decode_cursor<'a>(
    secret: &[u8],
    sort: SortMode,
    token: Option<&'a str>,
) -> Result<Option<cursor::DecodedCursor>, AppError> {
    token
        .map(|t| cursor::decode(secret, sort, t).map_err(|_| AppError::InvalidCursor))
        .transpose()
}
