//! Agents, tasks, and the sequential executor that chains them
//!
//! Tasks run strictly in list order. Every completed task's output is
//! recorded once and shown, in order, to every task that follows it.

pub mod agent;
pub mod backend;
pub mod executor;
pub mod output;
pub mod prompt;
pub mod task;
pub mod template;

pub use agent::{AgentDescriptor, Coworker, Persona};
pub use backend::{BackendError, Dispatch, ExecutionBackend, LlmBackend};
pub use executor::{Crew, DEFAULT_MAX_DELEGATIONS};
pub use output::{
    CrewOutput, FileSink, OutputFormat, ResultSink, SinkError, StdoutSink, TaskOutput,
};
pub use task::{RenderedTask, TaskDescriptor};
pub use template::TemplateError;
