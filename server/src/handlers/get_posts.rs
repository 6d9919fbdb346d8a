//! `social.coves.actor.getPosts` (§4.2, §6): a single actor's authored
//! posts, optionally narrowed to one community, paginated by the shared
//! feed cursor contract.
//!
//! `actor` may be a DID or a handle; an actor this AppView has never seen —
//! whether because the handle doesn't resolve locally or the DID has never
//! posted — returns an empty feed rather than 404 (§4.2, §7 open question):
//! the index store has no authoritative notion of account existence
//! separate from "has any rows", and distinguishing "unknown" from "no
//! posts yet" is left to a caller that consults the identity resolver
//! directly.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::feed::{author_feed, paginate_posts, validate_limit, FeedPage, SortMode, Timeframe};
use crate::handlers::decode_cursor;
use crate::handlers::view::{hydrate_post_views, PostView};
use crate::models::is_valid_did;
use crate::state::AppState;
use crate::store::{posts, users};

#[derive(Debug, Deserialize)]
pub struct GetPostsParams {
    pub actor: String,
    pub filter: Option<String>,
    pub community: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GetPostsResponse {
    pub posts: Vec<PostView>,
    pub cursor: Option<String>,
}

pub async fn get_posts(
    State(state): State<AppState>,
    Query(params): Query<GetPostsParams>,
) -> Result<Json<GetPostsResponse>, AppError> {
    let media_only = match params.filter.as_deref().unwrap_or("posts_with_replies") {
        "posts_with_replies" => false,
        "posts_with_media" => true,
        other => {
            return Err(AppError::InvalidRequest(format!(
                "unsupported filter {other:?}"
            )))
        }
    };

    let sort = SortMode::New;
    let limit = validate_limit(params.limit).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    let cursor = decode_cursor(&state.config.cursor_hmac_secret, sort, params.cursor.as_deref())?;

    let Some(author_did) = resolve_author_did(&state, &params.actor).await? else {
        return Ok(Json(GetPostsResponse { posts: Vec::new(), cursor: None }));
    };

    let (items, next_cursor) = match params.community.as_deref() {
        None => {
            let query = author_feed::AuthorFeedQuery {
                author_did: &author_did,
                sort,
                timeframe: Timeframe::All,
                media_only,
                cursor: cursor.as_ref(),
                limit,
            };
            let page: FeedPage<_> =
                author_feed::get_author_posts(&state.db_pool, &state.config.cursor_hmac_secret, query)
                    .await
                    .map_err(AppError::Storage)?;
            (page.items, page.cursor)
        }
        Some(community) => {
            // Narrowed to one community: `list_by_filter` supports
            // combining `author_did` with `community_did` even though its
            // usual callers (`getTimeline`/`getCommunity`/`getAuthorPosts`)
            // each set only one.
            let community_did = resolve_community_did(&state, community).await?;
            let filter = posts::PostFilter {
                community_did: Some(community_did.as_str()),
                subscribed_communities: None,
                author_did: Some(author_did.as_str()),
                media_only,
                sort,
                timeframe: Timeframe::All,
                cursor: cursor.as_ref(),
                limit,
            };
            let rows = posts::list_by_filter(&state.db_pool, filter)
                .await
                .map_err(AppError::Storage)?;
            let page = paginate_posts(rows, sort, cursor.as_ref(), &state.config.cursor_hmac_secret, limit)
                .map_err(AppError::Storage)?;
            (page.items, page.cursor)
        }
    };

    let views = hydrate_post_views(&state.hydrator, items)
        .await
        .map_err(AppError::Storage)?;
    Ok(Json(GetPostsResponse { posts: views, cursor: next_cursor }))
}

/// `None` means "no feed to show" (unresolvable handle, or a DID nobody has
/// ever indexed a post or user row for) — the caller turns that into an
/// empty feed rather than an error.
async fn resolve_author_did(state: &AppState, actor: &str) -> Result<Option<String>, AppError> {
    if is_valid_did(actor) {
        return Ok(Some(actor.to_string()));
    }
    let found = users::get_by_handle(&state.db_pool, actor).await.map_err(AppError::Storage)?;
    Ok(found.map(|u| u.did))
}

async fn resolve_community_did(state: &AppState, community: &str) -> Result<String, AppError> {
    let found = crate::community::resolve_community_handle(&state.db_pool, community)
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    found.map(|c| c.did).ok_or(AppError::CommunityNotFound)
}
