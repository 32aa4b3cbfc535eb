//! Execution backends
//!
//! The executor hands each task prompt to an [`ExecutionBackend`] together
//! with the persona of the agent doing the work. A backend either completes
//! the task or asks to delegate it to a coworker; the executor decides what
//! to do with a delegation request.

use crate::crew::agent::Persona;
use crate::llm::provider::{CompletionRequest, LlmError, LlmProvider, Message, TokenUsage};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

static DELEGATE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^DELEGATE:\s*`?([A-Za-z0-9._-]+)`?$").expect("valid delegation regex")
});

/// Outcome of one backend dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The agent produced the task result
    Completed { text: String, usage: TokenUsage },
    /// The agent handed the task to another agent by id
    Delegated { to_agent: String },
}

impl Dispatch {
    pub fn completed(text: impl Into<String>) -> Self {
        Self::Completed {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }

    pub fn delegated(to_agent: impl Into<String>) -> Self {
        Self::Delegated {
            to_agent: to_agent.into(),
        }
    }
}

/// Backend failures
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Backend failure: {0}")]
    Other(String),
}

/// Capability that turns a task prompt into text
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, prompt: &str, persona: &Persona) -> Result<Dispatch, BackendError>;
}

/// Backend that sends each prompt to an LLM provider
pub struct LlmBackend {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Instructions offering delegation, or None when the persona cannot delegate
    fn delegation_instructions(persona: &Persona) -> Option<String> {
        if !persona.allow_delegation || persona.coworkers.is_empty() {
            return None;
        }

        let mut text = String::from(
            "You may hand this task to one of your coworkers instead of doing it yourself.\nCoworkers:",
        );
        for coworker in &persona.coworkers {
            // write! into a String cannot fail
            let _ = write!(text, "\n- {} ({})", coworker.agent_id, coworker.role);
        }
        text.push_str(
            "\nTo delegate, reply with a single line `DELEGATE: <coworker id>` and nothing else. \
             Otherwise reply with your complete final answer.",
        );
        Some(text)
    }

    fn build_request(&self, prompt: &str, persona: &Persona) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(instructions) = Self::delegation_instructions(persona) {
            messages.push(Message::system(instructions));
        }
        messages.push(Message::user(prompt));

        let mut request = CompletionRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
            .metadata
            .insert("agent_id".to_string(), persona.agent_id.clone());
        request
    }
}

/// Delegation target named by a reply whose first non-empty line is
/// `DELEGATE: <id>`
pub fn parse_delegation(reply: &str) -> Option<String> {
    let first_line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    DELEGATE_DIRECTIVE
        .captures(first_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl ExecutionBackend for LlmBackend {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn dispatch(&self, prompt: &str, persona: &Persona) -> Result<Dispatch, BackendError> {
        let request = self.build_request(prompt, persona);
        let response = self.provider.complete(request).await?;

        debug!(
            agent_id = %persona.agent_id,
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            finish_reason = ?response.finish_reason,
            "LLM dispatch returned"
        );

        let text = response.content.unwrap_or_default();
        if persona.allow_delegation {
            if let Some(to_agent) = parse_delegation(&text) {
                return Ok(Dispatch::Delegated { to_agent });
            }
        }

        Ok(Dispatch::Completed {
            text,
            usage: response.usage,
        })
    }
}
