//! `social.coves.aggregator.authorize` (§4.1.6, added per §6's ambient
//! gap): lets a community owner grant or revoke an aggregator's posting
//! authorization. Like `community.post.create`, this is a delegated write
//! — the `social.coves.community.aggregatorAuthorization` record is
//! created in the community's own repo via its PDS session, and the
//! firehose round-trips it through `consumers::community::handle_authorization`
//! for the actual index update; this handler never writes the store
//! directly.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::community;
use crate::error::AppError;
use crate::state::AppState;

const AUTHORIZATION_COLLECTION: &str = "social.coves.community.aggregatorAuthorization";

#[derive(Debug, Deserialize)]
pub struct GrantAggregatorAuthorizationRequest {
    pub community: String,
    pub aggregator: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub config: Option<serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct GrantAggregatorAuthorizationResponse {
    pub uri: String,
    pub cid: String,
}

pub async fn grant_aggregator_authorization(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GrantAggregatorAuthorizationRequest>,
) -> Result<Json<GrantAggregatorAuthorizationResponse>, AppError> {
    let community = community::resolve_community_handle(&state.db_pool, &req.community)
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
        .ok_or(AppError::CommunityNotFound)?;

    if community.owner_did != auth.did {
        return Err(AppError::Unauthorized(
            "only the community owner may grant aggregator authorizations".into(),
        ));
    }
    if !crate::models::is_valid_did(&req.aggregator) {
        return Err(AppError::InvalidDid(req.aggregator.clone()));
    }

    let mut record = serde_json::json!({
        "$type": AUTHORIZATION_COLLECTION,
        "aggregator": req.aggregator,
        "enabled": req.enabled,
        "config": req.config.unwrap_or_else(|| serde_json::json!({})),
        "createdBy": auth.did,
        "createdAt": chrono::Utc::now().to_rfc3339(),
    });
    if !req.enabled {
        record["disabledBy"] = serde_json::Value::String(auth.did.clone());
    }

    let output = community::create_community_record(
        &state.db_pool,
        state.pds_client.as_ref(),
        &state.config.seal_key,
        &community,
        AUTHORIZATION_COLLECTION,
        &record,
    )
    .await
    .map_err(|e| AppError::ProvisioningFailed(e.to_string()))?;

    Ok(Json(GrantAggregatorAuthorizationResponse { uri: output.uri, cid: output.cid }))
}
