//! `social.coves.feed.getTimeline` (§6): the signed-in user's
//! subscribed-communities feed.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::feed::{timeline, validate_limit, SortMode, Timeframe};
use crate::handlers::decode_cursor;
use crate::handlers::view::{hydrate_post_views, PostView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetTimelineParams {
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
pub struct GetTimelineResponse {
    pub posts: Vec<PostView>,
    pub cursor: Option<String>,
}

pub async fn get_timeline(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<GetTimelineParams>,
) -> Result<Json<GetTimelineResponse>, AppError> {
    let limit = validate_limit(params.limit).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    let cursor = decode_cursor(&state.config.cursor_hmac_secret, params.sort, params.cursor.as_deref())?;

    let query = timeline::TimelineQuery {
        viewer_did: &auth.did,
        sort: params.sort,
        timeframe: params.timeframe,
        media_only: params.media_only,
        cursor: cursor.as_ref(),
        limit,
    };
    let page = timeline::get_timeline(&state.db_pool, &state.config.cursor_hmac_secret, query)
        .await
        .map_err(AppError::Storage)?;

    let views = hydrate_post_views(&state.hydrator, page.items)
        .await
        .map_err(AppError::Storage)?;
    Ok(Json(GetTimelineResponse { posts: views, cursor: page.cursor }))
}
