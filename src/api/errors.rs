use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire shape of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthInvalidCredentials,
    AuthMissingToken,
    AuthenticationFailed,
    AuthLogoutFailed,

    ValidInvalidInput,

    ResourceNotFound,
    ResourceUserNotFound,
    ResourceChatNotFound,
    ResourceConflict,

    UpstreamServiceError,
    SystemDatabaseError,
    SystemInternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthInvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            ErrorCode::AuthMissingToken => "AUTH_MISSING_TOKEN",
            ErrorCode::AuthenticationFailed => "AUTH_AUTHENTICATION_FAILED",
            ErrorCode::AuthLogoutFailed => "AUTH_LOGOUT_FAILED",

            ErrorCode::ValidInvalidInput => "VALID_INVALID_INPUT",

            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::ResourceUserNotFound => "RESOURCE_USER_NOT_FOUND",
            ErrorCode::ResourceChatNotFound => "RESOURCE_CHAT_NOT_FOUND",
            ErrorCode::ResourceConflict => "RESOURCE_CONFLICT",

            ErrorCode::UpstreamServiceError => "UPSTREAM_SERVICE_ERROR",
            ErrorCode::SystemDatabaseError => "SYSTEM_DATABASE_ERROR",
            ErrorCode::SystemInternalError => "SYSTEM_INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidInvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::AuthInvalidCredentials
            | ErrorCode::AuthMissingToken
            | ErrorCode::AuthenticationFailed => StatusCode::UNAUTHORIZED,

            ErrorCode::ResourceNotFound
            | ErrorCode::ResourceUserNotFound
            | ErrorCode::ResourceChatNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ResourceConflict => StatusCode::CONFLICT,

            ErrorCode::AuthLogoutFailed
            | ErrorCode::UpstreamServiceError
            | ErrorCode::SystemDatabaseError
            | ErrorCode::SystemInternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct AppError {
    code: ErrorCode,
    message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::AuthInvalidCredentials, "Invalid credentials")
    }

    pub fn missing_auth_header() -> Self {
        Self::new(
            ErrorCode::AuthMissingToken,
            "Missing or invalid authorization header",
        )
    }

    pub fn authentication_failed() -> Self {
        Self::new(ErrorCode::AuthenticationFailed, "Invalid token")
    }

    pub fn logout_failed() -> Self {
        Self::new(ErrorCode::AuthLogoutFailed, "Logout failed")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidInvalidInput, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource),
        )
    }

    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::ResourceUserNotFound, "User not found")
    }

    pub fn chat_not_found() -> Self {
        Self::new(ErrorCode::ResourceChatNotFound, "Chat not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceConflict, message)
    }

    /// Fixed user-facing message; the upstream detail is only logged.
    pub fn upstream_failure() -> Self {
        Self::new(
            ErrorCode::UpstreamServiceError,
            "Error communicating with the completion service",
        )
    }

    pub fn database_error() -> Self {
        Self::new(ErrorCode::SystemDatabaseError, "Database error")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SystemInternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiError {
            error: self.message,
            error_code: self.code.as_str().to_string(),
        });

        (self.code.status_code(), body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("Resource"),
            _ => {
                tracing::error!(error = %err, "database error");
                AppError::database_error()
            }
        }
    }
}
