//! Task descriptors

use crate::crew::agent::AgentDescriptor;
use crate::crew::template::{self, TemplateError};
use std::collections::HashMap;
use std::sync::Arc;

/// A unit of instructed work assigned to exactly one agent
///
/// `expected_output` is advisory: it is rendered and shown to the backend,
/// never checked against the result.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub description: String,
    pub expected_output: String,
    pub agent: Arc<AgentDescriptor>,
}

impl TaskDescriptor {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<AgentDescriptor>,
    ) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
        }
    }

    pub(crate) fn templates(&self) -> [(&'static str, &str); 2] {
        [
            ("description", self.description.as_str()),
            ("expected_output", self.expected_output.as_str()),
        ]
    }

    /// Render description and expected output against the run inputs
    pub fn render(&self, inputs: &HashMap<String, String>) -> Result<RenderedTask, TemplateError> {
        Ok(RenderedTask {
            description: template::render(&self.description, inputs)?,
            expected_output: template::render(&self.expected_output, inputs)?,
        })
    }

    /// First line of the description, for logs and summaries
    pub fn summary(&self) -> &str {
        self.description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
    }
}

/// Task text with all placeholders resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTask {
    pub description: String,
    pub expected_output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> Arc<AgentDescriptor> {
        Arc::new(AgentDescriptor::new(
            "writer",
            "Content Writer",
            "Write about {topic}",
            "You write.",
        ))
    }

    #[test]
    fn test_render_resolves_description_and_expected_output() {
        let task = TaskDescriptor::new(
            "1. Use the content plan to craft a blog post on {topic}.",
            "A blog post about {topic} in markdown format.",
            writer(),
        );
        let inputs = HashMap::from([("topic".to_string(), "Rust".to_string())]);

        let rendered = task.render(&inputs).unwrap();
        assert_eq!(
            rendered.description,
            "1. Use the content plan to craft a blog post on Rust."
        );
        assert_eq!(
            rendered.expected_output,
            "A blog post about Rust in markdown format."
        );
    }

    #[test]
    fn test_render_missing_input_fails() {
        let task = TaskDescriptor::new("outline for {topic}", "An outline", writer());
        assert!(task.render(&HashMap::new()).is_err());
    }

    #[test]
    fn test_agent_shared_between_tasks() {
        let agent = writer();
        let first = TaskDescriptor::new("a", "x", agent.clone());
        let second = TaskDescriptor::new("b", "y", agent.clone());

        assert!(Arc::ptr_eq(&first.agent, &second.agent));
        assert_eq!(Arc::strong_count(&agent), 3);
    }

    #[test]
    fn test_summary_skips_blank_lines() {
        let task = TaskDescriptor::new("\n  Proofread the post.\nThen polish.", "x", writer());
        assert_eq!(task.summary(), "Proofread the post.");
        assert_eq!(TaskDescriptor::new("", "x", writer()).summary(), "");
    }
}
