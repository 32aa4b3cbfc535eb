//! Mock implementations for testing
//!
//! Provides a scripted [`ExecutionBackend`] and a scripted [`LlmProvider`]
//! so crews can be exercised without network access.

use crate::crew::agent::Persona;
use crate::crew::backend::{BackendError, Dispatch, ExecutionBackend};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One call observed by [`MockBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDispatch {
    pub prompt: String,
    pub persona: Persona,
}

/// Backend that replays scripted outcomes in call order and records every
/// prompt it receives
///
/// Calls past the end of the script complete with "Mock response".
#[derive(Debug, Default)]
pub struct MockBackend {
    pub script: Vec<Result<Dispatch, BackendError>>,
    pub calls: Arc<Mutex<Vec<RecordedDispatch>>>,
}

impl MockBackend {
    /// Complete each call with the next reply
    pub fn new(replies: &[&str]) -> Self {
        Self::scripted(replies.iter().map(|r| Ok(Dispatch::completed(*r))).collect())
    }

    pub fn scripted(script: Vec<Result<Dispatch, BackendError>>) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply normally, but fail the call at `failing_call` (zero-based)
    pub fn failing_at(replies: &[&str], failing_call: usize) -> Self {
        let mut script: Vec<Result<Dispatch, BackendError>> = replies
            .iter()
            .map(|r| Ok(Dispatch::completed(*r)))
            .collect();
        let failure = Err(BackendError::Other("Mock backend failure".to_string()));
        if failing_call < script.len() {
            script[failing_call] = failure;
        } else {
            script.resize_with(failing_call, || Ok(Dispatch::completed("Mock response")));
            script.push(failure);
        }
        Self::scripted(script)
    }

    pub async fn recorded(&self) -> Vec<RecordedDispatch> {
        self.calls.lock().await.clone()
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|c| c.prompt.clone())
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn dispatch(&self, prompt: &str, persona: &Persona) -> Result<Dispatch, BackendError> {
        let mut calls = self.calls.lock().await;
        let index = calls.len();
        calls.push(RecordedDispatch {
            prompt: prompt.to_string(),
            persona: persona.clone(),
        });

        self.script
            .get(index)
            .cloned()
            .unwrap_or_else(|| Ok(Dispatch::completed("Mock response")))
    }
}

/// Mock LLM provider cycling through canned responses
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request.clone());

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[*current % self.responses.len()].clone()
        };
        *current += 1;

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: request.metadata,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
