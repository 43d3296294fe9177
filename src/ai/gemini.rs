use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{CompletionProvider, CompletionResponse, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ContentPart>>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Reply text at `candidates[0].content.parts[0].text`; `None` when
    /// any link of that chain is missing.
    fn into_reply(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
    }
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Configuration from `GEMINI_API_KEY` / `GEMINI_BASE_URL` /
    /// `GEMINI_MODEL`. A missing key surfaces as an upstream auth error
    /// on the first request rather than at startup.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            std::env::var("GEMINI_BASE_URL").ok(),
            std::env::var("GEMINI_MODEL").ok(),
        )
    }

    fn prepare_request(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, ProviderError> {
        let body = self.prepare_request(prompt);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Gemini API error ({}): {}", status, error_text).into());
        }

        let decoded: GenerateContentResponse = response.json().await?;

        Ok(CompletionResponse {
            text: decoded.into_reply(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_extracted_from_the_first_candidate_part() {
        let decoded: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "hello" }, { "text": "ignored" }] } },
                { "content": { "parts": [{ "text": "also ignored" }] } }
            ]
        }))
        .unwrap();

        assert_eq!(decoded.into_reply().as_deref(), Some("hello"));
    }

    #[test]
    fn missing_links_in_the_chain_yield_none() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{}] }),
            json!({ "candidates": [{ "content": {} }] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
            json!({ "candidates": [{ "content": { "parts": [{}] } }] }),
        ] {
            let decoded: GenerateContentResponse = serde_json::from_value(body).unwrap();
            assert_eq!(decoded.into_reply(), None);
        }
    }

    #[test]
    fn request_body_wraps_the_prompt_as_sole_content() {
        let provider = GeminiProvider::new("k".to_string(), None, None);
        let body = provider.prepare_request("what is rust");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "what is rust");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }
}
