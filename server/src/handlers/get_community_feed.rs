//! `social.coves.community.getFeed` (§6): one community's feed.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::feed::{community_feed, validate_limit, SortMode, Timeframe};
use crate::handlers::decode_cursor;
use crate::handlers::view::{hydrate_post_views, PostView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetCommunityFeedParams {
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub media_only: bool,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GetCommunityFeedResponse {
    pub posts: Vec<PostView>,
    pub cursor: Option<String>,
}

pub async fn get_community_feed(
    Path(community): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<GetCommunityFeedParams>,
) -> Result<Json<GetCommunityFeedResponse>, AppError> {
    let community = crate::community::resolve_community_handle(&state.db_pool, &community)
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
        .ok_or(AppError::CommunityNotFound)?;

    let limit = validate_limit(params.limit).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    let cursor = decode_cursor(&state.config.cursor_hmac_secret, params.sort, params.cursor.as_deref())?;

    let query = community_feed::CommunityFeedQuery {
        community_did: &community.did,
        sort: params.sort,
        timeframe: params.timeframe,
        media_only: params.media_only,
        cursor: cursor.as_ref(),
        limit,
    };
    let page = community_feed::get_community_feed(&state.db_pool, &state.config.cursor_hmac_secret, query)
        .await
        .map_err(AppError::Storage)?;

    let views = hydrate_post_views(&state.hydrator, page.items)
        .await
        .map_err(AppError::Storage)?;
    Ok(Json(GetCommunityFeedResponse { posts: views, cursor: page.cursor }))
}
