use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::get_database_pool;
use crate::database::models::User;

pub async fn create_user(
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING id, username, email, password_hash, created_at, updated_at",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(&*pool)
    .await
}

pub async fn get_user_by_id(user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
}

pub async fn get_user_by_username_or_email(ident: &str) -> Result<Option<User>, sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1 OR email = $1")
        .bind(ident)
        .fetch_optional(&*pool)
        .await
}

pub async fn add_login_token(
    user_id: Uuid,
    token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    let pool = get_database_pool()?;
    sqlx::query("INSERT INTO user_login_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&*pool)
        .await?;
    Ok(())
}

pub async fn remove_login_token(token: &str) -> Result<bool, sqlx::Error> {
    let pool = get_database_pool()?;
    let result = sqlx::query("DELETE FROM user_login_tokens WHERE token = $1")
        .bind(token)
        .execute(&*pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
