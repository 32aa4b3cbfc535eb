//! Agent descriptors and rendered personas

use crate::crew::template::{self, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A role-playing agent: who it is, what it wants, and whether it may hand
/// work to a coworker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Identifier used by task assignments and delegation targets
    pub id: String,
    /// Short label, e.g. "Content Planner"
    pub role: String,
    /// Objective template
    pub goal: String,
    /// Persona template
    pub backstory: String,
    #[serde(default)]
    pub allow_delegation: bool,
}

impl AgentDescriptor {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            allow_delegation: false,
        }
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    /// Templated fields, labelled for error reporting
    pub(crate) fn templates(&self) -> [(&'static str, &str); 2] {
        [("goal", self.goal.as_str()), ("backstory", self.backstory.as_str())]
    }

    /// Resolve goal and backstory against the run inputs
    pub fn persona(&self, inputs: &HashMap<String, String>) -> Result<Persona, TemplateError> {
        Ok(Persona {
            agent_id: self.id.clone(),
            role: self.role.clone(),
            goal: template::render(&self.goal, inputs)?,
            backstory: template::render(&self.backstory, inputs)?,
            allow_delegation: self.allow_delegation,
            coworkers: Vec::new(),
        })
    }
}

/// A coworker an agent may delegate to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coworker {
    pub agent_id: String,
    pub role: String,
}

/// Fully rendered agent identity handed to the execution backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub agent_id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    /// Populated only when `allow_delegation` is set
    pub coworkers: Vec<Coworker>,
}

impl Persona {
    /// System-prompt rendering of the persona
    pub fn to_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }
}
