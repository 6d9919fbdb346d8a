//! Provisioning, credential refresh, and delegated writes (§4.3).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;

use crate::models::{is_valid_community_name, Community};
use crate::seal::{seal, unseal, SealKey};
use crate::store::{communities, DbPool};

use super::pds_client::{CommunityProfileRecord, CreateRecordOutput, PdsClient, PdsClientError};

const PROFILE_COLLECTION: &str = "social.coves.community.profile";

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("community name {0:?} is not a valid DNS label (1-63 chars, [A-Za-z0-9], interior hyphens only)")]
    InvalidName(String),
    #[error("community name {0:?} is already taken")]
    NameTaken(String),
    #[error("provisioning failed: {0}")]
    ProvisioningFailed(String),
    #[error(transparent)]
    Seal(#[from] crate::seal::SealError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<PdsClientError> for LifecycleError {
    fn from(e: PdsClientError) -> Self {
        LifecycleError::ProvisioningFailed(e.to_string())
    }
}

fn generate_password() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct ProvisionRequest<'a> {
    pub name: &'a str,
    pub display_name: &'a str,
    pub description: Option<&'a str>,
    pub created_by_did: &'a str,
    pub pds_url: &'a str,
    pub instance_host: &'a str,
}

/// Provisioning (§4.3 steps 1-4). No partial row is written on PDS failure:
/// the `Community` insert only happens once both PDS calls (account
/// creation, profile record emission) have already succeeded.
pub async fn provision(
    pool: &DbPool,
    pds: &dyn PdsClient,
    seal_key: &SealKey,
    req: ProvisionRequest<'_>,
) -> Result<Community, LifecycleError> {
    if !is_valid_community_name(req.name) {
        return Err(LifecycleError::InvalidName(req.name.to_string()));
    }
    if communities::get_by_name(pool, req.name).await?.is_some() {
        return Err(LifecycleError::NameTaken(req.name.to_string()));
    }

    let describe = pds
        .describe_server(req.pds_url)
        .await
        .map_err(|e| LifecycleError::ProvisioningFailed(format!("describeServer: {e}")))?;

    let handle = super::handle::canonical_handle(req.name, req.instance_host);
    let email = format!("{}@communities.{}", req.name, req.instance_host);
    let password = generate_password();

    let account = pds
        .create_account(req.pds_url, &handle, &email, &password)
        .await
        .map_err(|e| LifecycleError::ProvisioningFailed(format!("createAccount: {e}")))?;

    let profile = CommunityProfileRecord {
        record_type: PROFILE_COLLECTION,
        display_name: req.display_name,
        description: req.description,
        created_at: Utc::now().to_rfc3339(),
    };
    let profile_json = serde_json::to_value(&profile)
        .map_err(|e| LifecycleError::ProvisioningFailed(format!("profile record: {e}")))?;
    let CreateRecordOutput { uri: record_uri, cid: record_cid } = pds
        .create_record(req.pds_url, &account.access_jwt, &account.did, PROFILE_COLLECTION, &profile_json)
        .await
        .map_err(|e| LifecycleError::ProvisioningFailed(format!("createRecord: {e}")))?;

    let community = communities::create(
        pool,
        communities::NewCommunity {
            did: &account.did,
            handle: &handle,
            name: req.name,
            display_name: req.display_name,
            owner_did: &account.did,
            created_by_did: req.created_by_did,
            hosted_by_did: &describe.host_did,
            pds_url: req.pds_url,
            pds_email: &email,
            pds_password_sealed: &seal(seal_key, &password),
            pds_access_token_sealed: &seal(seal_key, &account.access_jwt),
            pds_refresh_token_sealed: &seal(seal_key, &account.refresh_jwt),
            record_uri: &record_uri,
            record_cid: &record_cid,
        },
    )
    .await?;

    Ok(community)
}

/// Credential lifecycle (§4.3): try `refreshSession` first; if the PDS
/// rejects the refresh token, fall back to decrypting the stored password
/// and negotiating a brand new session. Either path replaces both sealed
/// tokens within one store call.
pub async fn ensure_fresh_session(
    pool: &DbPool,
    pds: &dyn PdsClient,
    seal_key: &SealKey,
    community: &Community,
) -> Result<String, LifecycleError> {
    let refresh_jwt = unseal(seal_key, &community.pds_refresh_token_sealed)?;

    let session = match pds.refresh_session(&community.pds_url, &refresh_jwt).await {
        Ok(session) => session,
        Err(_auth_error) => {
            let password = unseal(seal_key, &community.pds_password_sealed)?;
            pds.create_session(&community.pds_url, &community.did, &password)
                .await
                .map_err(|e| LifecycleError::ProvisioningFailed(format!("createSession fallback: {e}")))?
        }
    };

    communities::update_session_tokens(
        pool,
        &community.did,
        &seal(seal_key, &session.access_jwt),
        &seal(seal_key, &session.refresh_jwt),
    )
    .await?;

    Ok(session.access_jwt)
}

/// Community-authored writes (§4.3): delegated to the PDS using the
/// community's own session, never the authenticated user's.
pub async fn create_community_record(
    pool: &DbPool,
    pds: &dyn PdsClient,
    seal_key: &SealKey,
    community: &Community,
    collection: &str,
    record: &serde_json::Value,
) -> Result<CreateRecordOutput, LifecycleError> {
    let access_jwt = ensure_fresh_session(pool, pds, seal_key, community).await?;
    let output = pds
        .create_record(&community.pds_url, &access_jwt, &community.did, collection, record)
        .await?;
    Ok(output)
}
