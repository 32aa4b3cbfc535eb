//! Sequential crew executor
//!
//! A [`Crew`] owns an ordered task list and an execution backend. Each run
//! validates every template up front, then executes tasks strictly in list
//! order, feeding every recorded output forward as context to the tasks
//! that follow. The first failure aborts the run and discards what was
//! recorded so far.

use crate::crew::agent::{AgentDescriptor, Coworker, Persona};
use crate::crew::backend::{Dispatch, ExecutionBackend};
use crate::crew::output::{CrewOutput, TaskOutput};
use crate::crew::prompt::build_prompt;
use crate::crew::task::{RenderedTask, TaskDescriptor};
use crate::crew::template::{self, TemplateError};
use crate::error::{CrewError, CrewResult, TaskFailure};
use crate::llm::provider::TokenUsage;
use crate::{crew_span, dispatch_span, task_span};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Delegation hops allowed per task unless configured otherwise
pub const DEFAULT_MAX_DELEGATIONS: usize = 3;

/// Ordered tasks, the agents that may work on them, and the backend that
/// executes them
pub struct Crew {
    name: String,
    agents: Vec<Arc<AgentDescriptor>>,
    tasks: Vec<TaskDescriptor>,
    backend: Arc<dyn ExecutionBackend>,
    max_delegations: usize,
}

/// State owned by a single run
struct PipelineRun<'a> {
    run_id: Uuid,
    inputs: &'a HashMap<String, String>,
    accumulated_context: Vec<TaskOutput>,
    token_usage: TokenUsage,
}

/// Result of executing one task, possibly after delegation
struct Completion {
    agent: Arc<AgentDescriptor>,
    text: String,
    usage: TokenUsage,
}

fn unresolved_at(location: String) -> impl FnOnce(TemplateError) -> CrewError {
    move |err| match err {
        TemplateError::UnresolvedPlaceholder { placeholder } => {
            CrewError::unresolved(location, placeholder)
        }
    }
}

impl Crew {
    /// Create a crew whose roster is the set of agents assigned to `tasks`
    pub fn new(tasks: Vec<TaskDescriptor>, backend: Arc<dyn ExecutionBackend>) -> Self {
        let mut agents: Vec<Arc<AgentDescriptor>> = Vec::new();
        for task in &tasks {
            if !agents.iter().any(|a| a.id == task.agent.id) {
                agents.push(task.agent.clone());
            }
        }

        Self {
            name: "crew".to_string(),
            agents,
            tasks,
            backend,
            max_delegations: DEFAULT_MAX_DELEGATIONS,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add agents that hold no task of their own but can receive delegations
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Arc<AgentDescriptor>>) -> Self {
        for agent in agents {
            if !self.agents.iter().any(|a| a.id == agent.id) {
                self.agents.push(agent);
            }
        }
        self
    }

    pub fn with_max_delegations(mut self, max_delegations: usize) -> Self {
        self.max_delegations = max_delegations;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> &[Arc<AgentDescriptor>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Run the crew and return only the final task's text
    pub async fn run(&self, inputs: &HashMap<String, String>) -> CrewResult<String> {
        self.kickoff(inputs).await.map(|output| output.final_output)
    }

    /// Run the crew and return every task output along with the final text
    pub async fn kickoff(&self, inputs: &HashMap<String, String>) -> CrewResult<CrewOutput> {
        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            inputs,
            accumulated_context: Vec::with_capacity(self.tasks.len()),
            token_usage: TokenUsage::default(),
        };
        let span = crew_span!(crew = %self.name, run_id = %run.run_id, tasks = self.tasks.len());

        async move {
            self.validate(inputs)?;
            self.execute(run).await
        }
        .instrument(span)
        .await
    }

    /// Check every template against `inputs` before anything is dispatched
    pub fn validate(&self, inputs: &HashMap<String, String>) -> CrewResult<()> {
        if self.tasks.is_empty() {
            return Err(CrewError::EmptyPipeline);
        }

        for agent in &self.agents {
            for (field, text) in agent.templates() {
                template::render(text, inputs)
                    .map_err(unresolved_at(format!("agent '{}' {field}", agent.id)))?;
            }
        }

        for (index, task) in self.tasks.iter().enumerate() {
            for (field, text) in task.templates() {
                template::render(text, inputs)
                    .map_err(unresolved_at(format!("task {index} {field}")))?;
            }
        }

        let templates = self
            .agents
            .iter()
            .flat_map(|a| a.templates())
            .chain(self.tasks.iter().flat_map(|t| t.templates()))
            .map(|(_, text)| text);
        for key in template::unused_inputs(templates, inputs) {
            warn!(input = %key, "Input is not referenced by any agent or task template");
        }

        Ok(())
    }

    async fn execute(&self, mut run: PipelineRun<'_>) -> CrewResult<CrewOutput> {
        info!(
            backend = self.backend.name(),
            agents = self.agents.len(),
            "Crew run started"
        );
        let started = Instant::now();

        for (index, task) in self.tasks.iter().enumerate() {
            let span = task_span!(task_index = index, agent = %task.agent.id);
            let output = self.execute_task(index, task, &run).instrument(span).await;

            let completion = match output {
                Ok(completion) => completion,
                Err(e) => {
                    error!(
                        task_index = index,
                        completed = run.accumulated_context.len(),
                        error = %e,
                        "Crew run aborted"
                    );
                    return Err(e);
                }
            };

            run.token_usage += completion.usage;
            run.accumulated_context.push(TaskOutput {
                task_index: index,
                agent_id: completion.agent.id.clone(),
                agent_role: completion.agent.role.clone(),
                description: task.summary().to_string(),
                raw: completion.text,
                completed_at: Utc::now(),
            });
        }

        let final_output = run
            .accumulated_context
            .last()
            .map(|output| output.raw.clone())
            .ok_or(CrewError::EmptyPipeline)?;

        let output = CrewOutput {
            run_id: run.run_id,
            final_output,
            tasks_output: run.accumulated_context,
            token_usage: run.token_usage,
        };
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{}",
            output.summary()
        );
        Ok(output)
    }

    async fn execute_task(
        &self,
        index: usize,
        task: &TaskDescriptor,
        run: &PipelineRun<'_>,
    ) -> CrewResult<Completion> {
        let rendered: RenderedTask = task
            .render(run.inputs)
            .map_err(unresolved_at(format!("task {index}")))?;

        info!(summary = %task.summary(), "Task started");
        let started = Instant::now();

        let mut agent = task.agent.clone();
        let mut hops = 0;

        loop {
            let persona = self.persona_for(&agent, run.inputs)?;
            let prompt = build_prompt(&persona, &rendered, &run.accumulated_context);
            debug!(
                agent = %agent.id,
                prompt_chars = prompt.len(),
                context_entries = run.accumulated_context.len(),
                "Dispatching task"
            );

            let dispatch = self
                .backend
                .dispatch(&prompt, &persona)
                .instrument(dispatch_span!(agent = %agent.id, hop = hops))
                .await
                .map_err(|e| CrewError::task_failed(index, e))?;

            match dispatch {
                Dispatch::Completed { text, usage } => {
                    if text.trim().is_empty() {
                        return Err(CrewError::task_failed(index, TaskFailure::EmptyOutput));
                    }
                    info!(
                        agent = %agent.id,
                        output_chars = text.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Task completed"
                    );
                    return Ok(Completion { agent, text, usage });
                }
                Dispatch::Delegated { to_agent } => {
                    let target = self.resolve_delegate(index, &agent, &to_agent)?;
                    hops += 1;
                    if hops > self.max_delegations {
                        return Err(CrewError::task_failed(
                            index,
                            TaskFailure::DelegationLimitExceeded {
                                limit: self.max_delegations,
                            },
                        ));
                    }
                    info!(from = %agent.id, to = %target.id, hop = hops, "Task delegated");
                    agent = target;
                }
            }
        }
    }

    fn resolve_delegate(
        &self,
        index: usize,
        from: &AgentDescriptor,
        to_agent: &str,
    ) -> CrewResult<Arc<AgentDescriptor>> {
        if !from.allow_delegation {
            return Err(CrewError::task_failed(
                index,
                TaskFailure::DelegationNotAllowed {
                    agent: from.id.clone(),
                },
            ));
        }

        self.agents
            .iter()
            .find(|a| a.id == to_agent && a.id != from.id)
            .cloned()
            .ok_or_else(|| {
                CrewError::task_failed(
                    index,
                    TaskFailure::UnknownDelegate {
                        agent: from.id.clone(),
                        target: to_agent.to_string(),
                    },
                )
            })
    }

    fn persona_for(
        &self,
        agent: &AgentDescriptor,
        inputs: &HashMap<String, String>,
    ) -> CrewResult<Persona> {
        let mut persona = agent
            .persona(inputs)
            .map_err(unresolved_at(format!("agent '{}'", agent.id)))?;

        if agent.allow_delegation {
            persona.coworkers = self
                .agents
                .iter()
                .filter(|a| a.id != agent.id)
                .map(|a| Coworker {
                    agent_id: a.id.clone(),
                    role: a.role.clone(),
                })
                .collect();
        }

        Ok(persona)
    }
}
