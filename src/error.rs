//! Error types for crew runs
//!
//! Every fatal condition aborts the whole run; callers decide whether to
//! retry it. Messages that leave the process go through
//! [`CrewError::sanitized_message`].

use crate::crew::backend::BackendError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SECRET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("valid secret regex")
});

static SENSITIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid path regex")
});

const MAX_MESSAGE_LEN: usize = 500;

/// Why a task dispatch failed
#[derive(Debug, Clone, Error)]
pub enum TaskFailure {
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("backend returned empty content")]
    EmptyOutput,
    #[error("agent '{agent}' is not allowed to delegate")]
    DelegationNotAllowed { agent: String },
    #[error("delegation target '{target}' is not a coworker of '{agent}'")]
    UnknownDelegate { agent: String, target: String },
    #[error("delegation limit of {limit} exceeded")]
    DelegationLimitExceeded { limit: usize },
}

/// Main error type for crew operations
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Unresolved placeholder {{{placeholder}}} in {location}")]
    UnresolvedPlaceholder {
        location: String,
        placeholder: String,
    },

    #[error("Task {task_index} failed: {cause}")]
    TaskExecutionFailed {
        task_index: usize,
        #[source]
        cause: TaskFailure,
    },

    #[error("Pipeline has no tasks")]
    EmptyPipeline,

    #[error("Task references unknown agent '{agent}'")]
    UnknownAgent { agent: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::provider::LlmError),
}

impl CrewError {
    pub fn task_failed(task_index: usize, cause: impl Into<TaskFailure>) -> Self {
        Self::TaskExecutionFailed {
            task_index,
            cause: cause.into(),
        }
    }

    pub fn unresolved(location: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::UnresolvedPlaceholder {
            location: location.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Display text with secrets redacted and length capped
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Redact credentials and sensitive paths, truncate to 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_ASSIGNMENT.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH
        .replace_all(&sanitized, "/***REDACTED***/")
        .into_owned();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(suffix);
    }

    sanitized
}

/// Result type for crew operations
pub type CrewResult<T> = Result<T, CrewError>;
