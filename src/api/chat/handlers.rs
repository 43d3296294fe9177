use axum::{extract::Path, http::StatusCode, Extension, Json};
use uuid::Uuid;

use crate::api::errors::AppError;
use crate::api::middleware::AuthenticatedUser;
use crate::database::models::{Chat, ChatSummary};
use crate::database::queries::chats;

use super::types::{ChatWithMessages, CreateChatRequest, MessageResponse};

/// List the authenticated user's chats, most recently touched first.
pub async fn list_chats(
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    match chats::list_chats(auth_user.user_id).await? {
        Some(chats) => Ok(Json(chats)),
        None => Err(AppError::user_not_found()),
    }
}

/// Create an empty chat; the title is the first message the user typed.
pub async fn create_chat(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<Chat>), AppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::invalid_argument("Title is required"));
    }

    let chat = chats::create_chat(auth_user.user_id, title).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// One chat with its messages in append order.
pub async fn get_chat(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatWithMessages>, AppError> {
    let Some(chat) = chats::get_chat(chat_id, auth_user.user_id).await? else {
        return Err(AppError::chat_not_found());
    };

    let messages = chats::get_chat_messages(chat_id, auth_user.user_id).await?;
    Ok(Json(ChatWithMessages::new(chat, messages)))
}

pub async fn delete_chat(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if chats::delete_chat(chat_id, auth_user.user_id).await? {
        Ok(Json(MessageResponse {
            message: "Chat deleted successfully".to_string(),
        }))
    } else {
        Err(AppError::chat_not_found())
    }
}
