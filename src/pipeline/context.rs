//! Per-document agent conversation.

use std::time::Duration;

use tracing::debug;

use crate::llm::{AgentError, ChatMessage, ExtractionAgent};

/// Conversation memory owned by a single document.
///
/// Created when a document starts and dropped when its row is written, so
/// nothing said about one document can leak into the next.
pub struct AgentContext<'a> {
    agent: &'a dyn ExtractionAgent,
    timeout: Duration,
    messages: Vec<ChatMessage>,
    calls: usize,
}

impl<'a> AgentContext<'a> {
    pub fn new(agent: &'a dyn ExtractionAgent, system_prompt: &str, timeout: Duration) -> Self {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        Self {
            agent,
            timeout,
            messages,
            calls: 0,
        }
    }

    /// Send a task and record the exchange.
    ///
    /// A failed or timed-out call leaves the conversation unchanged.
    pub async fn ask(&mut self, task: String) -> Result<String, AgentError> {
        self.messages.push(ChatMessage::user(task));
        self.calls += 1;
        debug!("Agent call {} ({} messages)", self.calls, self.messages.len());

        let result = match tokio::time::timeout(self.timeout, self.agent.complete(&self.messages))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.timeout)),
        };

        match result {
            Ok(answer) => {
                self.messages.push(ChatMessage::assistant(answer.clone()));
                Ok(answer)
            }
            Err(e) => {
                self.messages.pop();
                Err(e)
            }
        }
    }

    /// Record an exchange replayed from a checkpoint without calling the agent.
    pub fn remember(&mut self, task: String, answer: String) {
        self.messages.push(ChatMessage::user(task));
        self.messages.push(ChatMessage::assistant(answer));
    }

    /// Agent calls made through this context.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ExtractionAgent for Echo {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last == "fail" {
                return Err(AgentError::Api("boom".to_string()));
            }
            Ok(format!("echo: {}", last))
        }
    }

    struct Slow;

    #[async_trait]
    impl ExtractionAgent for Slow {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn ask_records_exchange() {
        let mut ctx = AgentContext::new(&Echo, "sys", Duration::from_secs(1));
        assert_eq!(ctx.ask("hi".to_string()).await.unwrap(), "echo: hi");
        assert_eq!(ctx.messages().len(), 3);
        assert_eq!(ctx.calls(), 1);
    }

    #[tokio::test]
    async fn failed_call_is_not_remembered() {
        let mut ctx = AgentContext::new(&Echo, "", Duration::from_secs(1));
        assert!(ctx.ask("fail".to_string()).await.is_err());
        assert!(ctx.messages().is_empty());
        assert_eq!(ctx.calls(), 1);
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let timeout = Duration::from_millis(50);
        let mut ctx = AgentContext::new(&Slow, "", timeout);
        let err = ctx.ask("hi".to_string()).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(d) if d == timeout));
        assert!(ctx.messages().is_empty());
    }

    #[test]
    fn remember_does_not_count_calls() {
        let mut ctx = AgentContext::new(&Echo, "sys", Duration::from_secs(1));
        ctx.remember("task".to_string(), "answer".to_string());
        assert_eq!(ctx.calls(), 0);
        assert_eq!(ctx.messages().len(), 3);
    }
}
