use axum::{extract::Path, Extension, Json};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::ai::gemini::GeminiProvider;
use crate::ai::provider::CompletionProvider;
use crate::api::errors::AppError;
use crate::api::middleware::AuthenticatedUser;
use crate::database::models::MessageSender;
use crate::database::queries::{chats, users};

use super::types::{SendMessageRequest, SendMessageResponse};

/// Substituted when the completion response carries no reply text.
pub const FALLBACK_REPLY: &str = "Sorry, no response.";

static COMPLETION: Lazy<GeminiProvider> = Lazy::new(GeminiProvider::from_env);

/// POST /api/chat/{chat_id}/message
pub async fn send_message(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    relay_message(&*COMPLETION, auth_user.user_id, chat_id, &request.message)
        .await
        .map(Json)
}

/// Relay one user message through the completion service.
///
/// The user's message is persisted before the upstream call and stays
/// persisted when that call fails; the chat is then left with a trailing
/// unanswered message and retry is up to the user.
pub async fn relay_message<P>(
    provider: &P,
    user_id: Uuid,
    chat_id: Uuid,
    text: &str,
) -> Result<SendMessageResponse, AppError>
where
    P: CompletionProvider + ?Sized,
{
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::invalid_argument("Message is required"));
    }

    if users::get_user_by_id(user_id).await?.is_none() {
        return Err(AppError::user_not_found());
    }
    let Some(chat) = chats::get_chat(chat_id, user_id).await? else {
        return Err(AppError::chat_not_found());
    };

    chats::append_message(chat.id, user_id, MessageSender::User, text)
        .await?
        .ok_or_else(AppError::chat_not_found)?;

    let reply = match provider.complete(text).await {
        Ok(response) => response
            .text
            .unwrap_or_else(|| FALLBACK_REPLY.to_string()),
        Err(err) => {
            tracing::error!(
                chat_id = %chat.id,
                provider = provider.provider_name(),
                error = %err,
                "completion request failed"
            );
            return Err(AppError::upstream_failure());
        }
    };

    chats::append_message(chat.id, user_id, MessageSender::Bot, &reply)
        .await?
        .ok_or_else(AppError::chat_not_found)?;

    Ok(SendMessageResponse {
        reply,
        chat_id: chat.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{CompletionResponse, ProviderError};
    use crate::api::errors::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CompletionProvider for CountingProvider {
        async fn complete(&self, _prompt: &str) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                text: Some("ok".to_string()),
            })
        }

        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_upstream_call() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };

        let err = relay_message(&provider, Uuid::new_v4(), Uuid::new_v4(), "   \t\n")
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidInvalidInput);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
