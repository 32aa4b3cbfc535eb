//! Observability: structured logging and span helpers for crew runs

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{crew_span, dispatch_span, task_span};
