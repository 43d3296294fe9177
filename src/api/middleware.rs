use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};

use crate::api::auth::AUTH_SERVICE;
use crate::api::errors::AppError;
use crate::auth::AuthError;
use crate::database::models::User;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub user: User,
}

/// Validates the bearer token and attaches the user to request extensions.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = auth_header else {
        return Err(AppError::missing_auth_header());
    };

    match AUTH_SERVICE.get_user_by_token(token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthenticatedUser {
                user_id: user.id,
                user,
            });
            Ok(next.run(req).await)
        }
        Ok(None) => Err(AppError::authentication_failed()),
        Err(AuthError::Database(e)) => Err(e.into()),
        // malformed or forged tokens
        Err(_) => Err(AppError::authentication_failed()),
    }
}

/// Bearer token as presented, for handlers that need the raw value.
pub fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}
