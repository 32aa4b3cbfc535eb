//! Task and crew results, and sinks that consume the final article

use crate::llm::provider::TokenUsage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// Recorded result of one completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Zero-based position in the task list
    pub task_index: usize,
    /// Agent that produced the text (the delegate, if the task was handed off)
    pub agent_id: String,
    pub agent_role: String,
    /// First line of the task description
    pub description: String,
    pub raw: String,
    pub completed_at: DateTime<Utc>,
}

/// Result of a successful crew run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    pub run_id: Uuid,
    pub final_output: String,
    pub tasks_output: Vec<TaskOutput>,
    pub token_usage: TokenUsage,
}

impl CrewOutput {
    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "run {} completed {} task(s), {} chars, {} tokens",
            self.run_id,
            self.tasks_output.len(),
            self.final_output.len(),
            self.token_usage.total_tokens
        )
    }
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.final_output)
    }
}

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write to stdout: {0}")]
    Stdout(#[source] std::io::Error),
    #[error("Failed to serialize crew output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How a sink renders a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Only the final article
    #[default]
    Markdown,
    /// The whole run record: every task output, token usage, run id
    Json,
}

impl OutputFormat {
    pub fn render(self, output: &CrewOutput) -> Result<String, SinkError> {
        match self {
            OutputFormat::Markdown => Ok(output.final_output.clone()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(output)?),
        }
    }
}

/// Consumer of a finished run's article
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, output: &CrewOutput) -> Result<(), SinkError>;
}

/// Prints the run to standard output
#[derive(Debug, Default)]
pub struct StdoutSink {
    format: OutputFormat,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl ResultSink for StdoutSink {
    async fn publish(&self, output: &CrewOutput) -> Result<(), SinkError> {
        let text = self.format.render(output)?;
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(SinkError::Stdout)?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n").await.map_err(SinkError::Stdout)?;
        }
        stdout.flush().await.map_err(SinkError::Stdout)
    }
}

/// Writes the run to a file, creating parent directories
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: OutputFormat::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn publish(&self, output: &CrewOutput) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }
        let text = self.format.render(output)?;
        tokio::fs::write(&self.path, text.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;

        info!(path = %self.path.display(), run_id = %output.run_id, "Wrote crew output");
        Ok(())
    }
}
