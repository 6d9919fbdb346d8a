//! The Feed Engine (§4.2): sort modes, hot-rank computation, opaque cursors,
//! and the three read surfaces (`getTimeline`, `getCommunity`,
//! `getAuthorPosts`) built on top of `store::posts::list_by_filter`.

pub mod author_feed;
pub mod community_feed;
pub mod cursor;
pub mod hot_rank;
pub mod hydrate;
pub mod timeline;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default and maximum page sizes shared by every feed surface (§4.2).
pub const DEFAULT_PAGE_SIZE: i64 = 15;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, thiserror::Error)]
#[error("limit must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
pub struct InvalidLimit(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    New,
    Top,
    Hot,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Hot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Day
    }
}

impl Timeframe {
    /// The lower bound on `created_at` for `top`, or `None` for `all` (§4.2).
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Hour => Some(now - Duration::hours(1)),
            Timeframe::Day => Some(now - Duration::days(1)),
            Timeframe::Week => Some(now - Duration::weeks(1)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::Year => Some(now - Duration::days(365)),
            Timeframe::All => None,
        }
    }
}

/// Values outside `[1, 50]` are a request error, not silently clamped (§4.2).
pub fn validate_limit(requested: Option<i64>) -> Result<i64, InvalidLimit> {
    let limit = requested.unwrap_or(DEFAULT_PAGE_SIZE);
    if (1..=MAX_PAGE_SIZE).contains(&limit) {
        Ok(limit)
    } else {
        Err(InvalidLimit(limit))
    }
}

/// A page of feed results plus the opaque cursor for the next page, `None`
/// when the page was not full (the feed has been exhausted).
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

/// Turns the rows `store::posts::list_by_filter` returned into a page: for
/// `new`/`top` the store already applied the ordering, predicate, and
/// limit, so this just slices off a trailing cursor. For `hot` the store
/// over-fetched a `(created_at, uri)`-ordered superset, so this ranks by
/// `hot_rank` in memory, applies the cursor predicate there, and re-limits
/// (§4.2 — hot_rank is not a stored column).
pub fn paginate_posts(
    mut posts: Vec<crate::models::Post>,
    sort: SortMode,
    cursor: Option<&cursor::DecodedCursor>,
    cursor_secret: &[u8],
    limit: i64,
) -> anyhow::Result<FeedPage<crate::models::Post>> {
    match sort {
        SortMode::New => {
            let has_more = posts.len() as i64 >= limit && !posts.is_empty();
            let next_cursor = if has_more {
                posts.last().map(|p| {
                    cursor::encode(
                        cursor_secret,
                        SortMode::New,
                        &p.uri,
                        &p.created_at.to_rfc3339(),
                        None,
                    )
                })
            } else {
                None
            };
            Ok(FeedPage {
                items: posts,
                cursor: next_cursor,
            })
        }
        SortMode::Top => {
            let has_more = posts.len() as i64 >= limit && !posts.is_empty();
            let next_cursor = if has_more {
                posts.last().map(|p| {
                    cursor::encode(
                        cursor_secret,
                        SortMode::Top,
                        &p.uri,
                        &p.created_at.to_rfc3339(),
                        Some(p.score),
                    )
                })
            } else {
                None
            };
            Ok(FeedPage {
                items: posts,
                cursor: next_cursor,
            })
        }
        SortMode::Hot => {
            let mut ranked: Vec<(f64, crate::models::Post)> = posts
                .drain(..)
                .map(|p| (hot_rank::hot_rank(p.score, p.created_at), p))
                .collect();
            ranked.sort_by(|(ra, a), (rb, b)| {
                rb.partial_cmp(ra)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.uri.cmp(&b.uri))
            });
            if let Some(c) = cursor {
                let cursor_rank = c.hot_rank_key()?;
                ranked.retain(|(rank, p)| {
                    *rank < cursor_rank || (*rank == cursor_rank && p.uri > c.uri)
                });
            }
            let has_more = ranked.len() as i64 > limit;
            ranked.truncate(limit as usize);
            let next_cursor = if has_more {
                ranked.last().map(|(rank, p)| {
                    cursor::encode(
                        cursor_secret,
                        SortMode::Hot,
                        &p.uri,
                        &hot_rank::format_hot_rank(*rank),
                        None,
                    )
                })
            } else {
                None
            };
            Ok(FeedPage {
                items: ranked.into_iter().map(|(_, p)| p).collect(),
                cursor: next_cursor,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_timeframe_has_no_lower_bound() {
        assert_eq!(Timeframe::All.since(Utc::now()), None);
    }

    #[test]
    fn day_timeframe_bounds_to_24_hours_ago() {
        let now = Utc::now();
        let since = Timeframe::Day.since(now).unwrap();
        assert_eq!((now - since).num_hours(), 24);
    }

    #[test]
    fn missing_limit_defaults_to_fifteen() {
        assert_eq!(validate_limit(None).unwrap(), 15);
    }

    #[test]
    fn out_of_range_limit_is_rejected() {
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(51)).is_err());
    }

    #[test]
    fn in_range_limit_passes_through() {
        assert_eq!(validate_limit(Some(50)).unwrap(), 50);
    }
}
