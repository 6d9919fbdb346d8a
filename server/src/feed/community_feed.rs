//! `getCommunity` (§4.2): a single community's feed, independent of the
//! viewer's subscriptions.

use crate::models::Post;
use crate::store::{posts, DbPool};

use super::{cursor::DecodedCursor, paginate_posts, FeedPage, SortMode, Timeframe};

pub struct CommunityFeedQuery<'a> {
    pub community_did: &'a str,
    pub sort: SortMode,
    pub timeframe: Timeframe,
    pub media_only: bool,
    pub cursor: Option<&'a DecodedCursor>,
    pub limit: i64,
}

pub async fn get_community_feed(
    pool: &DbPool,
    cursor_secret: &[u8],
    q: CommunityFeedQuery<'_>,
) -> anyhow::Result<FeedPage<Post>> {
    let filter = posts::PostFilter {
        community_did: Some(q.community_did),
        subscribed_communities: None,
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
