//! `getTimeline` (§4.2): the signed-in user's subscribed-communities feed.

use crate::models::Post;
use crate::store::{posts, subscriptions, DbPool};

use super::{cursor::DecodedCursor, paginate_posts, FeedPage, SortMode, Timeframe};

pub struct TimelineQuery<'a> {
    pub viewer_did: &'a str,
    pub sort: SortMode,
    pub timeframe: Timeframe,
    pub media_only: bool,
    pub cursor: Option<&'a DecodedCursor>,
    pub limit: i64,
}

/// Empty subscriptions yield an empty feed rather than an error — a new
/// account's timeline is simply quiet until it subscribes to a community.
pub async fn get_timeline(pool: &DbPool, cursor_secret: &[u8], q: TimelineQuery<'_>) -> anyhow::Result<FeedPage<Post>> {
    let subscribed = subscriptions::list_subscribed_community_dids(pool, q.viewer_did).await?;
    if subscribed.is_empty() {
        return Ok(FeedPage {
            items: Vec::new(),
            cursor: None,
        });
    }

    let filter = posts::PostFilter {
        community_did: None,
        subscribed_communities: Some(&subscribed),
        author_did: None,
        media_only: q.media_only,
        sort: q.sort,
        timeframe: q.timeframe,
        cursor: q.cursor,
        limit: q.limit,
    };
    let rows = posts::list_by_filter(pool, filter).await?;
    paginate_posts(rows, q.sort, q.cursor, cursor_secret, q.limit)
}
