//! `social.coves.community.create` (§4.3, added per §6's ambient gap — the
//! distilled endpoint table never wires up the provisioning flow it
//! otherwise fully specifies).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::community::{self, LifecycleError};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommunityResponse {
    pub did: String,
    pub handle: String,
    pub name: String,
}

pub async fn create_community(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCommunityRequest>,
) -> Result<Json<CreateCommunityResponse>, AppError> {
    let community = community::provision(
        &state.db_pool,
        state.pds_client.as_ref(),
        &state.config.seal_key,
        community::ProvisionRequest {
            name: &req.name,
            display_name: &req.display_name,
            description: req.description.as_deref(),
            created_by_did: &auth.did,
            pds_url: &state.config.pds_url,
            instance_host: &state.config.instance_host,
        },
    )
    .await
    .map_err(lifecycle_error)?;

    Ok(Json(CreateCommunityResponse {
        did: community.did,
        handle: community.handle,
        name: community.name,
    }))
}

fn lifecycle_error(e: LifecycleError) -> AppError {
    match e {
        LifecycleError::InvalidName(name) => {
            AppError::InvalidRequest(format!("community name {name:?} is not a valid DNS label"))
        }
        LifecycleError::NameTaken(name) => {
            AppError::InvalidRequest(format!("community name {name:?} is already taken"))
        }
        LifecycleError::ProvisioningFailed(msg) => AppError::ProvisioningFailed(msg),
        LifecycleError::Seal(err) => AppError::Storage(err.into()),
        LifecycleError::Store(err) => AppError::Storage(err),
    }
}
