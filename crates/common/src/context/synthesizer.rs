//! Language model clients
//!
//! Provides:
//! - `LanguageModel` interface: one completion per call
//! - OpenAI-compatible chat client with timeout and a single retry on
//!   transport failure
//! - Offline model that answers from the grounding context alone

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[validate(length(max = 8000))]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Opaque text-completion service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete `user_text` given a system context and prior turns.
    /// Failures surface as `UpstreamModelFailure`.
    async fn complete(&self, system_context: &str, history: &[ChatMessage], user_text: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
    }

    async fn call(&self, request: &ChatRequest<'_>) -> Result<String> {
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(first) => {
                warn!(error = %first, model = %self.model, "Language model transport failure, retrying once");
                self.send(request).await.map_err(|e| AppError::UpstreamModelFailure {
                    message: format!("request failed after retry: {}", e),
                })?
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamModelFailure {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::UpstreamModelFailure {
            message: format!("Failed to parse response: {}", e),
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::UpstreamModelFailure {
                message: "Empty response from language model".to_string(),
            })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_context: &str, history: &[ChatMessage], user_text: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(ChatRole::System, system_context));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::new(ChatRole::User, user_text));

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let started = Instant::now();
        let result = self.call(&request).await;
        metrics::record_llm(&self.model, result.is_ok(), started.elapsed());
        debug!(model = %self.model, ok = result.is_ok(), elapsed_ms = started.elapsed().as_millis() as u64, "Language model call");
        result
    }
}

/// Deterministic model for running without credentials; restates the
/// numbered grounding facts and live data found in the system context.
#[derive(Debug, Default, Clone)]
pub struct OfflineModel;

impl OfflineModel {
    const NAME: &'static str = "offline";
}

#[async_trait]
impl LanguageModel for OfflineModel {
    fn model_name(&self) -> &str {
        Self::NAME
    }

    async fn complete(&self, system_context: &str, _history: &[ChatMessage], _user_text: &str) -> Result<String> {
        let grounded: Vec<&str> = system_context
            .lines()
            .map(str::trim)
            .filter(|line| {
                let numbered = line.starts_with('[') && line[1..].starts_with(|c: char| c.is_ascii_digit());
                numbered || line.starts_with("- ")
            })
            .collect();

        metrics::record_llm(Self::NAME, true, Duration::ZERO);

        if grounded.is_empty() {
            return Ok("I couldn't find that topic in my financial knowledge base. \
                Try asking about stocks, bonds, interest rates, inflation or cryptocurrencies."
                .to_string());
        }

        Ok(format!(
            "Here is what my financial knowledge base says:\n\n{}\n\n\
            (Offline mode: this answer is assembled from the knowledge graph without a language model.)",
            grounded.join("\n")
        ))
    }
}

/// Pick the language model for `config`, falling back to offline when no
/// API key is available
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => match config.api_key.clone().filter(|k| !k.is_empty()) {
            Some(key) => Ok(Arc::new(OpenAiChatModel::new(config, key)?)),
            None => {
                warn!("No language model API key configured, using offline model");
                Ok(Arc::new(OfflineModel))
            }
        },
        "offline" => Ok(Arc::new(OfflineModel)),
        other => {
            warn!(provider = other, "Unknown language model provider, using offline model");
            Ok(Arc::new(OfflineModel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> LlmConfig {
        LlmConfig {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_openai_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "ctx" },
                    { "role": "user", "content": "earlier" },
                    { "role": "assistant", "content": "reply" },
                    { "role": "user", "content": "What is a bond?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "A bond is a loan [1]." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server), "test-key".into()).unwrap();
        let history = vec![
            ChatMessage::new(ChatRole::User, "earlier"),
            ChatMessage::new(ChatRole::Assistant, "reply"),
        ];
        let answer = model.complete("ctx", &history, "What is a bond?").await.unwrap();
        assert_eq!(answer, "A bond is a loan [1].");
    }

    #[tokio::test]
    async fn test_api_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server), "test-key".into()).unwrap();
        let err = model.complete("ctx", &[], "hi").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamModelFailure { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_after_retry() {
        let config = LlmConfig {
            // port 9 (discard) is closed on loopback
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let model = OpenAiChatModel::new(&config, "k".into()).unwrap();
        let err = model.complete("ctx", &[], "hi").await.unwrap_err();
        match err {
            AppError::UpstreamModelFailure { message } => assert!(message.contains("after retry")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_model_restates_facts() {
        let context = "You are FinGraph.\n\n## Financial Concepts\n[1] Bond: A debt security.\n\n## Live Market Data\n- BTC (crypto): 67250.00 USD\n";
        let answer = OfflineModel.complete(context, &[], "bonds?").await.unwrap();
        assert!(answer.contains("[1] Bond: A debt security."));
        assert!(answer.contains("- BTC (crypto): 67250.00 USD"));

        let empty = OfflineModel.complete("You are FinGraph.", &[], "weather?").await.unwrap();
        assert!(empty.contains("couldn't find"));
    }

    #[test]
    fn test_factory_falls_back_to_offline() {
        let model = create_language_model(&LlmConfig::default()).unwrap();
        assert_eq!(model.model_name(), "offline");

        let keyed = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(create_language_model(&keyed).unwrap().model_name(), "gpt-4o-mini");
    }
}
