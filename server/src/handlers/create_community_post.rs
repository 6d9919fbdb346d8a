//! `social.coves.community.post.create` (§6): a delegated write. The
//! record is created through the target community's own PDS session, not
//! the caller's (§4.3) — the community, not the authenticated human, is
//! the repo the post record lands in, which is why the body must not
//! carry an `authorDid`. The firehose round-trips the new record back
//! through the ordinary post consumer; this handler only reports the
//! `uri`/`cid` the PDS assigned, it does not write to the index store.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::community;
use crate::error::AppError;
use crate::state::AppState;

const POST_COLLECTION: &str = "social.coves.post";

#[derive(Debug, Deserialize)]
pub struct CreateCommunityPostRequest {
    pub community: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub embed: Option<Value>,
    pub labels: Option<Value>,
    /// Rejected explicitly rather than silently ignored — see module docs.
    #[serde(rename = "authorDid")]
    pub author_did: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommunityPostResponse {
    pub uri: String,
    pub cid: String,
}

pub async fn create_community_post(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCommunityPostRequest>,
) -> Result<Json<CreateCommunityPostResponse>, AppError> {
    if req.author_did.is_some() {
        return Err(AppError::InvalidRequest(
            "authorDid MUST NOT appear in the request body".into(),
        ));
    }

    let community = community::resolve_community_handle(&state.db_pool, &req.community)
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
        .ok_or(AppError::CommunityNotFound)?;

    let record = serde_json::json!({
        "$type": POST_COLLECTION,
        "title": req.title,
        "content": req.content,
        "embed": req.embed,
        "labels": req.labels,
        "createdAt": chrono::Utc::now().to_rfc3339(),
    });

    let output = community::create_community_record(
        &state.db_pool,
        state.pds_client.as_ref(),
        &state.config.seal_key,
        &community,
        POST_COLLECTION,
        &record,
    )
    .await
    .map_err(|e| AppError::ProvisioningFailed(e.to_string()))?;

    Ok(Json(CreateCommunityPostResponse { uri: output.uri, cid: output.cid }))
}
