//! OpenAI-compatible chat completion client
//!
//! One call per theme. Transient failures are retried under the client's
//! `RetryPolicy`; everything else is returned to the caller untouched.
use crate::{
    config::LlmConfig,
    error::{AppError, AppResult},
    models::openai::{
        recommendation_response_format, ChatCompletionRequest, ChatCompletionResponse,
        ChatMessage,
    },
    services::{
        providers::LanguageModel,
        retry::{retry_with_backoff, RetryPolicy},
    },
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const SERVICE: &str = "OpenAI";

#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    structured_output: bool,
    retry_policy: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, retry_policy: RetryPolicy, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http_client: HttpClient::builder().timeout(timeout).build()?,
            api_key: config.gpt4o_api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            structured_output: config.structured_output,
            retry_policy,
        })
    }

    fn build_request(&self, system: &str, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            n: 1,
            response_format: self
                .structured_output
                .then(recommendation_response_format),
        }
    }

    async fn send_once(&self, body: &ChatCompletionRequest) -> AppResult<String> {
        let url = format!("{}/v1/chat/completions", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = AppError::from_response(SERVICE, response).await;
            tracing::warn!(error = %err, status = ?err.status(), "Chat completion request failed");
            return Err(err);
        }

        let completion: ChatCompletionResponse = response.json().await?;
        extract_content(completion)
    }
}

/// Pulls the first choice's text out of a completion
fn extract_content(completion: ChatCompletionResponse) -> AppResult<String> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Parse("Completion contained no choices".to_string()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(AppError::Parse(format!("Model refused: {}", refusal)));
    }

    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!("Completion was truncated at max_tokens; parsing what arrived");
    }

    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String> {
        let body = self.build_request(system, prompt);
        let body = &body;
        let client = self;

        let content = retry_with_backoff("chat completion", &self.retry_policy, move || {
            client.send_once(body)
        })
        .await?;

        tracing::info!(
            model = %self.model,
            chars = content.len(),
            provider = "openai",
            "Completion received"
        );

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client(structured_output: bool) -> OpenAiClient {
        let config = LlmConfig {
            gpt4o_api_key: "sk-test".to_string(),
            api_url: "http://test.local/".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.2,
            structured_output,
        };
        OpenAiClient::new(&config, RetryPolicy::none(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = create_test_client(false);
        assert_eq!(client.api_url, "http://test.local");
    }

    #[test]
    fn test_build_request_with_structured_output() {
        let client = create_test_client(true);
        let request = client.build_request("You are a recommendation system for movies.", "hi");

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.n, 1);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1], ChatMessage::user("hi"));
        assert!(request.response_format.is_some());
    }

    #[test]
    fn test_build_request_without_structured_output() {
        let client = create_test_client(false);
        let request = client.build_request("sys", "hi");
        assert!(request.response_format.is_none());
    }

    #[test]
    fn test_extract_content_trims() {
        let completion: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "  1. Heat\n"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(completion).unwrap(), "1. Heat");
    }

    #[test]
    fn test_extract_content_no_choices_is_parse_error() {
        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_content(completion),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_extract_content_refusal_is_parse_error() {
        let completion: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null, "refusal": "I can't help"}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            extract_content(completion),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_extract_content_null_content_is_empty() {
        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(extract_content(completion).unwrap(), "");
    }
}
