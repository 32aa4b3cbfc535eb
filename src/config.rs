//! Crew configuration
//!
//! A crew file is TOML: one `[crew]` section, one `[llm]` section, optional
//! default `[inputs]`, and ordered `[[agents]]` and `[[tasks]]` arrays.
//! Task order in the file is execution order.

use crate::crew::agent::AgentDescriptor;
use crate::crew::backend::ExecutionBackend;
use crate::crew::executor::{Crew, DEFAULT_MAX_DELEGATIONS};
use crate::crew::task::TaskDescriptor;
use crate::error::{CrewError, CrewResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The planner/writer/editor article crew shipped with the binary
pub const ARTICLE_CREW_TOML: &str = include_str!("../crews/article.toml");

const SUPPORTED_PROVIDERS: [&str; 2] = ["openai", "anthropic"];

/// Top-level crew configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewConfig {
    pub crew: CrewSection,
    pub llm: LlmSection,
    /// Default run-time inputs, overridable per run
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub agents: Vec<AgentDescriptor>,
    pub tasks: Vec<TaskSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewSection {
    pub name: String,
    /// Delegation hops allowed per task
    #[serde(default = "default_max_delegations")]
    pub max_delegations: usize,
}

fn default_max_delegations() -> usize {
    DEFAULT_MAX_DELEGATIONS
}

/// LLM backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl LlmSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A task entry; `agent` names an `[[agents]]` id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSection {
    pub description: String,
    pub expected_output: String,
    pub agent: String,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CrewConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CrewConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in article crew
    pub fn article() -> Result<Self, ConfigError> {
        Self::from_toml_str(ARTICLE_CREW_TOML)
    }

    /// Structural checks; template placeholders are checked per run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for agent in &self.agents {
            validate_agent_id(&agent.id)?;
            if !ids.insert(agent.id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Duplicate agent id '{}'",
                    agent.id
                )));
            }
        }

        if self.tasks.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "At least one [[tasks]] entry is required".to_string(),
            ));
        }

        for (index, task) in self.tasks.iter().enumerate() {
            if !ids.contains(task.agent.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Task {index} is assigned to undefined agent '{}'",
                    task.agent
                )));
            }
        }

        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}', expected one of {:?}",
                self.llm.provider, SUPPORTED_PROVIDERS
            )));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }

        Ok(())
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    /// Default inputs overlaid with `overrides`
    pub fn merged_inputs(&self, overrides: &HashMap<String, String>) -> HashMap<String, String> {
        let mut inputs: HashMap<String, String> = self
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        inputs.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        inputs
    }

    /// Build a runnable crew on top of `backend`
    ///
    /// Agents not assigned any task stay on the roster as delegation targets.
    pub fn build_crew(&self, backend: Arc<dyn ExecutionBackend>) -> CrewResult<Crew> {
        let agents: Vec<Arc<AgentDescriptor>> =
            self.agents.iter().cloned().map(Arc::new).collect();

        let tasks = self
            .tasks
            .iter()
            .map(|task| {
                let agent = agents
                    .iter()
                    .find(|a| a.id == task.agent)
                    .cloned()
                    .ok_or_else(|| CrewError::UnknownAgent {
                        agent: task.agent.clone(),
                    })?;
                Ok(TaskDescriptor::new(
                    task.description.clone(),
                    task.expected_output.clone(),
                    agent,
                ))
            })
            .collect::<CrewResult<Vec<_>>>()?;

        Ok(Crew::new(tasks, backend)
            .with_agents(agents)
            .with_name(self.crew.name.clone())
            .with_max_delegations(self.crew.max_delegations))
    }
}

/// Agent ids must match `[a-zA-Z0-9._-]+`
fn validate_agent_id(agent_id: &str) -> Result<(), ConfigError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if agent_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentId(format!(
            "Agent ID '{agent_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
