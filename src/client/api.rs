use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::chat::{
    ChatWithMessages, CreateChatRequest, MessageResponse, SendMessageRequest, SendMessageResponse,
};
use crate::api::errors::ApiError;
use crate::database::models::{ChatSummary, CreateUserRequest, LoginRequest, LoginResponse, User};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Transport seam for [`super::session::ChatSession`]; the session never
/// talks HTTP directly, so tests can swap in a scripted transport.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError>;
    async fn create_chat(&self, title: &str) -> Result<ChatSummary, ClientError>;
    async fn fetch_chat(&self, chat_id: Uuid) -> Result<ChatWithMessages, ClientError>;
    async fn send_message(
        &self,
        chat_id: Uuid,
        text: &str,
    ) -> Result<SendMessageResponse, ClientError>;
    async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
}

/// Bearer-authenticated transport against a running server.
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn login(
        base_url: &str,
        username_or_email: &str,
        password: &str,
    ) -> Result<LoginResponse, ClientError> {
        let response = Client::new()
            .post(format!(
                "{}/api/auth/login",
                base_url.trim_end_matches('/')
            ))
            .json(&LoginRequest {
                username_or_email: username_or_email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn register(
        base_url: &str,
        request: &CreateUserRequest,
    ) -> Result<User, ClientError> {
        let response = Client::new()
            .post(format!(
                "{}/api/auth/register",
                base_url.trim_end_matches('/')
            ))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ApiError>().await {
        Ok(api_error) => api_error.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ClientError::Api { status, message })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        let response = self
            .client
            .get(self.url("/api/chat"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_chat(&self, title: &str) -> Result<ChatSummary, ClientError> {
        let response = self
            .client
            .post(self.url("/api/chat/new"))
            .bearer_auth(&self.token)
            .json(&CreateChatRequest {
                title: title.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn fetch_chat(&self, chat_id: Uuid) -> Result<ChatWithMessages, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/api/chat/{}", chat_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response).await
    }

    async fn send_message(
        &self,
        chat_id: Uuid,
        text: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/api/chat/{}/message", chat_id)))
            .bearer_auth(&self.token)
            .json(&SendMessageRequest {
                message: text.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/chat/{}", chat_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode::<MessageResponse>(response).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/api/auth/logout"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Api {
                status,
                message: status
                    .canonical_reason()
                    .unwrap_or("logout failed")
                    .to_string(),
            })
        }
    }
}
