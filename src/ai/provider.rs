use async_trait::async_trait;

pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Decoded completion result. `None` means the response arrived but
/// carried no reply text at the expected path; callers pick the fallback.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: Option<String>,
}

/// Seam between the relay and a concrete completion backend.
///
/// Each call is stateless from the backend's perspective: the prompt is
/// the sole content, no conversation history is sent.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, ProviderError>;

    fn provider_name(&self) -> &'static str;
}
