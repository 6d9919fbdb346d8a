//! The wire-facing error taxonomy (§6, §7): a stable `error` code plus a
//! human `message`, mapped to HTTP status the way the teacher pairs an
//! internal error enum (`auth::AuthError`) with an `IntoResponse` impl.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("auth required")]
    AuthRequired,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid cursor")]
    InvalidCursor,
    #[error("request too large")]
    RequestTooLarge,
    #[error("community not found")]
    CommunityNotFound,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("actor not found")]
    ActorNotFound,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited")]
    RateLimited,
    #[error("already indexed")]
    AlreadyIndexed,
    #[error("threading is immutable")]
    ThreadingImmutable,
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("batch too large")]
    BatchTooLarge,
    #[error("invalid DID: {0}")]
    InvalidDid(String),
    #[error("provisioning failed: {0}")]
    ProvisioningFailed(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired => "AuthenticationRequired",
            AppError::AuthRequired => "AuthRequired",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::InvalidCursor => "InvalidCursor",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::CommunityNotFound => "CommunityNotFound",
            AppError::ProfileNotFound => "ProfileNotFound",
            AppError::ActorNotFound => "ActorNotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::RateLimited => "RateLimited",
            AppError::AlreadyIndexed => "AlreadyIndexed",
            AppError::ThreadingImmutable => "ThreadingImmutable",
            AppError::InvalidEvent(_) => "InvalidEvent",
            AppError::BatchTooLarge => "BatchTooLarge",
            AppError::InvalidDid(_) => "InvalidDID",
            AppError::ProvisioningFailed(_) => "ProvisioningFailed",
            AppError::Storage(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired | AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_)
            | AppError::InvalidCursor
            | AppError::AlreadyIndexed
            | AppError::ThreadingImmutable
            | AppError::InvalidEvent(_)
            | AppError::BatchTooLarge
            | AppError::InvalidDid(_) => StatusCode::BAD_REQUEST,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::CommunityNotFound | AppError::ProfileNotFound | AppError::ActorNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::ProvisioningFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Storage(_)) {
            tracing::error!(error = %self, "unhandled storage error");
        }
        let status = self.status();
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
