//! PDS XRPC client (§4.3 step 2): `describeServer`, `createAccount`,
//! `refreshSession`, `createRecord`. Generalizes the `reqwest::Client`
//! usage already in `auth.rs` for DID-document fetches into a full
//! write-capable client against a community's own PDS.

use axum::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdsClientError {
    #[error("PDS request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("PDS returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("PDS response missing field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
pub struct DescribeServerOutput {
    #[serde(rename = "did")]
    pub host_did: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountOutput {
    pub did: String,
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshSessionOutput {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordOutput {
    pub uri: String,
    pub cid: String,
}

/// A small adapter trait so `lifecycle` can be exercised against a fake
/// in tests without standing up a real PDS.
#[async_trait]
pub trait PdsClient: Send + Sync {
    async fn describe_server(&self, pds_url: &str) -> Result<DescribeServerOutput, PdsClientError>;

    async fn create_account(
        &self,
        pds_url: &str,
        handle: &str,
        email: &str,
        password: &str,
    ) -> Result<CreateAccountOutput, PdsClientError>;

    async fn refresh_session(
        &self,
        pds_url: &str,
        refresh_jwt: &str,
    ) -> Result<RefreshSessionOutput, PdsClientError>;

    async fn create_session(
        &self,
        pds_url: &str,
        identifier: &str,
        password: &str,
    ) -> Result<RefreshSessionOutput, PdsClientError>;

    async fn create_record(
        &self,
        pds_url: &str,
        access_jwt: &str,
        repo_did: &str,
        collection: &str,
        record: &Value,
    ) -> Result<CreateRecordOutput, PdsClientError>;
}

pub struct ReqwestPdsClient {
    http: reqwest::Client,
}

impl ReqwestPdsClient {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PdsClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdsClientError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PdsClient for ReqwestPdsClient {
    async fn describe_server(&self, pds_url: &str) -> Result<DescribeServerOutput, PdsClientError> {
        let url = format!("{pds_url}/xrpc/com.atproto.server.describeServer");
        self.send_json(self.http.get(&url)).await
    }

    async fn create_account(
        &self,
        pds_url: &str,
        handle: &str,
        email: &str,
        password: &str,
    ) -> Result<CreateAccountOutput, PdsClientError> {
        let url = format!("{pds_url}/xrpc/com.atproto.server.createAccount");
        let body = serde_json::json!({ "handle": handle, "email": email, "password": password });
        self.send_json(self.http.post(&url).json(&body)).await
    }

    async fn refresh_session(
        &self,
        pds_url: &str,
        refresh_jwt: &str,
    ) -> Result<RefreshSessionOutput, PdsClientError> {
        let url = format!("{pds_url}/xrpc/com.atproto.server.refreshSession");
        self.send_json(self.http.post(&url).bearer_auth(refresh_jwt)).await
    }

    async fn create_session(
        &self,
        pds_url: &str,
        identifier: &str,
        password: &str,
    ) -> Result<RefreshSessionOutput, PdsClientError> {
        let url = format!("{pds_url}/xrpc/com.atproto.server.createSession");
        let body = serde_json::json!({ "identifier": identifier, "password": password });
        self.send_json(self.http.post(&url).json(&body)).await
    }

    async fn create_record(
        &self,
        pds_url: &str,
        access_jwt: &str,
        repo_did: &str,
        collection: &str,
        record: &Value,
    ) -> Result<CreateRecordOutput, PdsClientError> {
        let url = format!("{pds_url}/xrpc/com.atproto.repo.createRecord");
        let body = serde_json::json!({ "repo": repo_did, "collection": collection, "record": record });
        self.send_json(self.http.post(&url).bearer_auth(access_jwt).json(&body)).await
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommunityProfileRecord<'a> {
    #[serde(rename = "$type")]
    pub record_type: &'a str,
    #[serde(rename = "displayName")]
    pub display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}
