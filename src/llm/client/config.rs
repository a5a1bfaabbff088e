//! LLM client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompts::{
    DEFAULT_EXTRACTION_PROMPT, DEFAULT_SYSTEM_PROMPT, DEFAULT_VERIFICATION_PROMPT,
};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
}

impl LlmProvider {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for the LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (ollama or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider-specific defaults apply)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model to use for extraction
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum characters of document content to send to the LLM
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Upper bound for a single LLM call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Custom system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Custom stage-one prompt (uses the {content} placeholder)
    #[serde(default)]
    pub extraction_prompt: Option<String>,
    /// Custom stage-two prompt (uses {product_info}, {query} and {results})
    #[serde(default)]
    pub verification_prompt: Option<String>,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_content_chars() -> usize {
    24000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
            extraction_prompt: None,
            verification_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "ollama" (default), "openai", "groq", or "together"
    /// - `LLM_ENDPOINT`: API endpoint (defaults based on provider)
    /// - `LLM_API_KEY`: API key for OpenAI-compatible providers
    /// - `LLM_MODEL`: Model name
    /// - `LLM_MAX_TOKENS`: Maximum tokens in response
    /// - `LLM_TEMPERATURE`: Generation temperature (0.0-1.0)
    /// - `LLM_MAX_CONTENT_CHARS`: Max document chars to send
    /// - `LLM_TIMEOUT_SECS`: Per-call timeout
    ///
    /// LLM_PROVIDER wins over auto-detection from API keys. Without it,
    /// GROQ_API_KEY and then OPENAI_API_KEY select an OpenAI-compatible provider.
    pub fn with_env_overrides(mut self) -> Self {
        let explicit_provider = std::env::var("LLM_PROVIDER").ok();
        if let Some(provider) = explicit_provider.as_deref().and_then(LlmProvider::from_name) {
            self.provider = provider;
        }

        let explicit_endpoint = std::env::var("LLM_ENDPOINT").ok();
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = endpoint.clone();
        }

        if let Ok(val) = std::env::var("LLM_API_KEY") {
            self.api_key = Some(val);
        }

        let detected = match explicit_provider.as_deref().map(str::to_lowercase) {
            Some(name) => {
                if self.api_key.is_none() {
                    self.api_key = match name.as_str() {
                        "groq" => std::env::var("GROQ_API_KEY").ok(),
                        "openai" => std::env::var("OPENAI_API_KEY").ok(),
                        _ => None,
                    };
                }
                Some(name)
            }
            None if self.api_key.is_none() => {
                if let Ok(key) = std::env::var("GROQ_API_KEY") {
                    self.api_key = Some(key);
                    self.provider = LlmProvider::OpenAI;
                    Some("groq".to_string())
                } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                    self.api_key = Some(key);
                    self.provider = LlmProvider::OpenAI;
                    Some("openai".to_string())
                } else {
                    None
                }
            }
            None => None,
        };

        if let Some(name) = detected {
            if explicit_endpoint.is_none() && self.endpoint == default_endpoint() {
                match name.as_str() {
                    "groq" => self.endpoint = "https://api.groq.com/openai".to_string(),
                    "openai" => self.endpoint = "https://api.openai.com".to_string(),
                    "together" => self.endpoint = "https://api.together.xyz".to_string(),
                    _ => {}
                }
            }
            if self.model == default_model() && name == "openai" {
                self.model = "gpt-4o-mini".to_string();
            }
        }

        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = val;
        }
        if let Ok(Ok(n)) = std::env::var("LLM_MAX_TOKENS").map(|v| v.parse()) {
            self.max_tokens = n;
        }
        if let Ok(Ok(t)) = std::env::var("LLM_TEMPERATURE").map(|v| v.parse()) {
            self.temperature = t;
        }
        if let Ok(Ok(n)) = std::env::var("LLM_MAX_CONTENT_CHARS").map(|v| v.parse()) {
            self.max_content_chars = n;
        }
        if let Ok(Ok(n)) = std::env::var("LLM_TIMEOUT_SECS").map(|v| v.parse()) {
            self.timeout_secs = n;
        }
        self
    }

    /// Per-call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Human-readable provider name for status output.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAI if self.endpoint.contains("groq.com") => "Groq",
            LlmProvider::OpenAI if self.endpoint.contains("together.xyz") => "Together",
            LlmProvider::OpenAI => "OpenAI",
        }
    }

    /// Get the system prompt, using custom or default.
    pub fn get_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Get the stage-one prompt, using custom or default.
    pub fn get_extraction_prompt(&self) -> &str {
        self.extraction_prompt
            .as_deref()
            .unwrap_or(DEFAULT_EXTRACTION_PROMPT)
    }

    /// Get the stage-two prompt, using custom or default.
    pub fn get_verification_prompt(&self) -> &str {
        self.verification_prompt
            .as_deref()
            .unwrap_or(DEFAULT_VERIFICATION_PROMPT)
    }
}
