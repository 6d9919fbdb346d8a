//! `getAuthorPosts` (§4.2). An author DID that indexes no posts — whether
//! because it has never posted or because it is unknown to this AppView —
//! returns an empty feed rather than a 404; the index store has no
//! authoritative notion of account existence separate from "has any rows".

use crate::models::Post;
use crate::store::{posts, DbPool};

use super::{cursor::DecodedCursor, paginate_posts, FeedPage, SortMode, Timeframe};

pub struct AuthorFeedQuery<'a> {
    pub author_did: &'a str,
    pub sort: SortMode,
    pub timeframe: Timeframe,
    pub media_only: bool,
    pub cursor: Option<&'a DecodedCursor>,
    pub limit: i64,
}

pub async fn get_author_posts(
    pool: &DbPool,
    cursor_secret: &[u8],
    q: AuthorFeedQuery<'_>,
) -> anyhow::Result<FeedPage<Post>> {
    let filter = posts::PostFilter {
        community_did: None,
        subscribed_communities: None,
        author_did: Some(q.author_did),
        media_only: q.media_only,
        sort: q.sort,
        timeframe: q.timeframe,
        cursor: q.cursor,
        limit: q.limit,
    };
    let rows = posts::list_by_filter(pool, filter).await?;
    paginate_posts(rows, q.sort, q.cursor, cursor_secret, q.limit)
}
