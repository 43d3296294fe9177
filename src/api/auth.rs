use axum::{
    extract::Request,
    http::StatusCode,
    Extension, Json,
};
use once_cell::sync::Lazy;

use crate::api::errors::AppError;
use crate::api::middleware::{bearer_token, AuthenticatedUser};
use crate::auth::{AuthError, AuthService};
use crate::database::models::{CreateUserRequest, LoginRequest, LoginResponse, User};

pub static AUTH_SERVICE: Lazy<AuthService> = Lazy::new(AuthService::default);

pub async fn login(Json(payload): Json<LoginRequest>) -> Result<Json<LoginResponse>, AppError> {
    match AUTH_SERVICE
        .authenticate_user(&payload.username_or_email, &payload.password)
        .await
    {
        Ok(Some(login_response)) => Ok(Json(login_response)),
        Ok(None) => Err(AppError::invalid_credentials()),
        Err(AuthError::Database(e)) => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            Err(AppError::internal_error("Authentication failed"))
        }
    }
}

pub async fn register(
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(AppError::invalid_argument(
            "Username, email and password are required",
        ));
    }
    if payload.password != payload.password2 {
        return Err(AppError::invalid_argument("Passwords do not match"));
    }

    match AUTH_SERVICE.create_user(payload).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(AuthError::Database(sqlx::Error::Database(db))) if db.is_unique_violation() => {
            Err(AppError::conflict("Username or email already in use"))
        }
        Err(AuthError::Database(e)) => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "user creation failed");
            Err(AppError::internal_error("Failed to create user"))
        }
    }
}

/// Revokes the presented login token. Client-side state is cleared
/// regardless of the outcome here.
pub async fn logout(req: Request) -> Result<StatusCode, AppError> {
    let Some(token) = bearer_token(&req) else {
        return Err(AppError::missing_auth_header());
    };

    if let Err(e) = AUTH_SERVICE.logout_user(token).await {
        tracing::error!(error = %e, "logout failed");
        return Err(AppError::logout_failed());
    }

    Ok(StatusCode::OK)
}

pub async fn me(Extension(auth_user): Extension<AuthenticatedUser>) -> Json<User> {
    Json(auth_user.user)
}
