//! LLM client for SDS extraction.
//!
//! Supports the Ollama chat API and OpenAI-compatible chat completions.

mod config;
mod prompts;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::HttpClient;
use crate::utils::truncate_utf8;

pub use config::{LlmConfig, LlmProvider};

/// Errors that can occur during LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Call did not finish in time
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
    /// Model answered with nothing
    #[error("Empty response from model")]
    Empty,
}

/// Chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The external extraction collaborator.
///
/// One call is one request/response exchange over the given conversation.
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError>;
}

/// Prompt templates for both stages, resolved from config.
#[derive(Debug, Clone)]
pub struct StagePrompts {
    pub system: String,
    pub extraction: String,
    pub verification: String,
    pub max_content_chars: usize,
}

impl Default for StagePrompts {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl StagePrompts {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            system: config.get_system_prompt().to_string(),
            extraction: config.get_extraction_prompt().to_string(),
            verification: config.get_verification_prompt().to_string(),
            max_content_chars: config.max_content_chars,
        }
    }

    /// Stage-one task for a document's text (truncated UTF-8 safely).
    pub fn render_extraction(&self, content: &str) -> String {
        let truncated = truncate_utf8(content, self.max_content_chars);
        self.extraction.replace("{content}", truncated)
    }

    /// Stage-two task from product fields and rendered search results.
    pub fn render_verification(&self, product_info: &str, query: &str, results: &str) -> String {
        let results = truncate_utf8(results, self.max_content_chars);
        self.verification
            .replace("{product_info}", product_info)
            .replace("{query}", query)
            .replace("{results}", results)
    }
}

/// LLM client for document processing.
pub struct LlmClient {
    config: LlmConfig,
    client: HttpClient,
}

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

/// OpenAI-compatible chat completion request.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Option<Vec<OpenAiChoice>>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, AgentError> {
        let client = HttpClient::builder(config.timeout())
            .build()
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Call Ollama's chat endpoint.
    async fn call_ollama(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let request = OllamaRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post_json_with_headers(&url, &request, &HashMap::new())
            .await
            .map_err(|e| connection_error(e, self.config.timeout()))?;

        if !resp.is_success() {
            let status = resp.status;
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(ollama_resp.message.content)
    }

    /// Call an OpenAI-compatible chat completions endpoint.
    async fn call_openai(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let request = OpenAiRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut headers = HashMap::new();
        if let Some(ref key) = self.config.api_key {
            headers.insert("Authorization".to_string(), format!("Bearer {}", key));
        }

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let resp = self
            .client
            .post_json_with_headers(&url, &request, &headers)
            .await
            .map_err(|e| connection_error(e, self.config.timeout()))?;

        if !resp.is_success() {
            let status = resp.status;
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(AgentError::Api(error.message));
        }

        body.choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or(AgentError::Empty)
    }
}

fn connection_error(e: reqwest::Error, timeout: Duration) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout(timeout)
    } else {
        AgentError::Connection(e.to_string())
    }
}

#[async_trait]
impl ExtractionAgent for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        debug!(
            "Calling {} model {} with {} messages",
            self.config.provider_name(),
            self.config.model,
            messages.len()
        );

        let response = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(messages).await?,
            LlmProvider::OpenAI => self.call_openai(messages).await?,
        };

        let response = response.trim();
        if response.is_empty() {
            return Err(AgentError::Empty);
        }
        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert_eq!(config.temperature, 0.0);
        assert!(config.extraction_prompt.is_none());
        assert!(config.get_extraction_prompt().contains("{content}"));
        assert!(config.get_verification_prompt().contains("{results}"));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(LlmProvider::from_name("Groq"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_name("ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::from_name("bard"), None);

        let config = LlmConfig {
            provider: LlmProvider::OpenAI,
            endpoint: "https://api.groq.com/openai".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(config.provider_name(), "Groq");
    }

    #[test]
    fn test_render_extraction_truncates() {
        let prompts = StagePrompts {
            system: String::new(),
            extraction: "<<{content}>>".to_string(),
            verification: String::new(),
            max_content_chars: 4,
        };
        assert_eq!(prompts.render_extraction("abcdefgh"), "<<abcd>>");
    }

    #[test]
    fn test_render_verification_placeholders() {
        let prompts = StagePrompts {
            system: String::new(),
            extraction: String::new(),
            verification: "{product_info}|{query}|{results}".to_string(),
            max_content_chars: 100,
        };
        assert_eq!(
            prompts.render_verification("info", "q", "hits"),
            "info|q|hits"
        );
    }

    #[test]
    fn test_chat_message_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_openai_response_parsing() {
        let body: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{}"}}]}"#,
        )
        .unwrap();
        let content = body
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);
        assert_eq!(content.as_deref(), Some("{}"));
    }
}
