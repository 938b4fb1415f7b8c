/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - stage / service のエラーを外向きの status 1 つに変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::auth::{AntiForgeryError, AuthError};
use crate::services::profiles::LookupError;
use crate::services::rooms::{PolicyViolation, RoomNotFound};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },
    #[error("{code}: {message}")]
    Forbidden { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("{code}: {message}")]
    Upstream { code: &'static str, message: String },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::BadRequest { code, message }
            | AppError::Unauthorized { code, message }
            | AppError::Forbidden { code, message }
            | AppError::Conflict { code, message }
            | AppError::Upstream { code, message } => (code, message),
            AppError::NotFound { resource } => ("NOT_FOUND", format!("{resource} not found.")),
            AppError::PayloadTooLarge => ("PAYLOAD_TOO_LARGE", "request body too large".into()),
            AppError::Internal => ("INTERNAL_SERVER_ERROR", "internal server error".into()),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredential => {
                AppError::unauthorized("MISSING_CREDENTIAL", "bearer credential not set")
            }
            AuthError::InvalidCredential(detail) => {
                AppError::unauthorized("INVALID_CREDENTIAL", detail)
            }
        }
    }
}

impl From<AntiForgeryError> for AppError {
    fn from(e: AntiForgeryError) -> Self {
        match e {
            AntiForgeryError::NotPresent => {
                AppError::bad_request("CSRF_TOKEN_MISSING", "csrf token not set")
            }
            AntiForgeryError::Invalid(_) => {
                AppError::forbidden("INVALID_CSRF_TOKEN", "invalid csrf token")
            }
        }
    }
}

impl From<RoomNotFound> for AppError {
    fn from(_: RoomNotFound) -> Self {
        AppError::not_found("room")
    }
}

impl From<PolicyViolation> for AppError {
    fn from(v: PolicyViolation) -> Self {
        match v {
            PolicyViolation::AlreadyMember => AppError::conflict(v.code(), v.to_string()),
            _ => AppError::forbidden(v.code(), v.to_string()),
        }
    }
}

impl From<LookupError> for AppError {
    fn from(e: LookupError) -> Self {
        tracing::warn!(error = %e, "member profile lookup failed");
        AppError::Upstream {
            code: "PROFILE_LOOKUP_FAILED",
            message: "member profile lookup failed".into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        tracing::error!(error = ?e, "repository failure");
        AppError::Internal
    }
}
