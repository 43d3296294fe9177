use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{CreateUserRequest, LoginResponse, User};
use crate::database::queries::users;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("malformed user id in token: {0}")]
    InvalidUserId(#[from] uuid::Error),
}

#[derive(Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // Without JWT_SECRET every restart invalidates outstanding tokens.
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| generate_secret()),
            jwt_expiration_hours: 24 * 7,
        }
    }
}

fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let secret: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(secret)
}

pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password, DEFAULT_COST)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, hash)
    }

    pub fn generate_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.config.jwt_expiration_hours);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(self.config.jwt_secret.as_ref());

        encode(&header, &claims, &key)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(token, &key, &validation)?;
        Ok(token_data.claims)
    }

    /// Random opaque token recorded per login and revoked on logout.
    pub fn generate_login_token(&self) -> String {
        let mut rng = rand::thread_rng();
        let token: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        hex::encode(token)
    }

    /// Authenticate by username or email; `None` on any credential mismatch.
    pub async fn authenticate_user(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Option<LoginResponse>, AuthError> {
        let Some(user) = users::get_user_by_username_or_email(username_or_email).await? else {
            return Ok(None);
        };

        if !self.verify_password(password, &user.password_hash)? {
            return Ok(None);
        }

        let token = self.generate_token(&user)?;

        let login_token = self.generate_login_token();
        let expires_at = Utc::now() + Duration::hours(self.config.jwt_expiration_hours);
        users::add_login_token(user.id, &login_token, Some(expires_at)).await?;

        Ok(Some(LoginResponse {
            token,
            user,
            expires_at,
        }))
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, AuthError> {
        let password_hash = self.hash_password(&request.password)?;
        let user = users::create_user(&request.username, &request.email, &password_hash).await?;
        Ok(user)
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        let claims = self.verify_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)?;

        let user = users::get_user_by_id(user_id).await?;
        Ok(user)
    }

    /// Revoke the login token; absent tokens are not an error.
    pub async fn logout_user(&self, token: &str) -> Result<(), AuthError> {
        users::remove_login_token(token).await?;
        Ok(())
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new(AuthConfig::default())
    }
}
