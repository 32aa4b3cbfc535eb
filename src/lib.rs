//! crewline - sequential role-playing agent crews
//!
//! A crew is an ordered list of tasks, each assigned to one agent persona.
//! Running the crew renders every template against the run inputs, then
//! dispatches the tasks one after another to an execution backend, handing
//! each task the outputs of all tasks before it. The last output is the
//! result.
//!
//! # Quick Start
//!
//! ```rust
//! use crewline::crew::{AgentDescriptor, Crew, TaskDescriptor};
//! use crewline::testing::MockBackend;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let planner = Arc::new(AgentDescriptor::new(
//!     "planner",
//!     "Content Planner",
//!     "Plan engaging content on {topic}",
//!     "You plan blog articles about {topic}.",
//! ));
//! let writer = Arc::new(AgentDescriptor::new(
//!     "writer",
//!     "Content Writer",
//!     "Write an opinion piece about {topic}",
//!     "You turn the planner's outline into an article.",
//! ));
//!
//! let crew = Crew::new(
//!     vec![
//!         TaskDescriptor::new("Outline an article on {topic}", "An outline", planner),
//!         TaskDescriptor::new("Write the article from the plan", "Markdown", writer),
//!     ],
//!     Arc::new(MockBackend::new(&["OUTLINE", "ARTICLE"])),
//! );
//!
//! let inputs = HashMap::from([("topic".to_string(), "Rust".to_string())]);
//! assert_eq!(crew.run(&inputs).await.unwrap(), "ARTICLE");
//! # });
//! ```

pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod observability;
pub mod testing;

pub use config::{ConfigError, CrewConfig};
pub use crew::{AgentDescriptor, Crew, CrewOutput, TaskDescriptor};
pub use error::{CrewError, CrewResult, TaskFailure};
