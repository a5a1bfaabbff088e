//! LLM integration for product field extraction and SDS lookups.
//!
//! The pipeline only depends on [`ExtractionAgent`]; [`LlmClient`] is the
//! production implementation speaking Ollama or OpenAI-compatible APIs.

mod client;

pub use client::{
    AgentError, ChatMessage, ExtractionAgent, LlmClient, LlmConfig, LlmProvider, Role,
    StagePrompts,
};
