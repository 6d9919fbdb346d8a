//! `social.coves.actor.getProfile` (§6): a bare `AuthorView` plus live
//! post/comment counts, resolved either by DID or by handle.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{comments, posts, users, DbPool};

#[derive(Debug, Deserialize)]
pub struct GetProfileParams {
    pub actor: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(rename = "postCount")]
    pub post_count: i64,
    #[serde(rename = "commentCount")]
    pub comment_count: i64,
}

pub async fn get_profile(
    State(pool): State<DbPool>,
    Query(params): Query<GetProfileParams>,
) -> Result<Json<ProfileView>, AppError> {
    let user = resolve_actor(&pool, &params.actor).await?;
    let post_count = posts::count_by_author(&pool, &user.did)
        .await
        .map_err(AppError::Storage)?;
    let comment_count = comments::count_by_author(&pool, &user.did)
        .await
        .map_err(AppError::Storage)?;

    Ok(Json(ProfileView {
        did: user.did,
        handle: user.handle,
        post_count,
        comment_count,
    }))
}

/// `actor` is either a bare DID or a handle (§6); unlike communities there
/// is no shorthand form, so this is a direct two-way dispatch.
async fn resolve_actor(pool: &DbPool, actor: &str) -> Result<crate::models::User, AppError> {
    let found = if crate::models::is_valid_did(actor) {
        users::get_by_did(pool, actor).await
    } else {
        users::get_by_handle(pool, actor).await
    }
    .map_err(AppError::Storage)?;
    found.ok_or(AppError::ActorNotFound)
}
