//! Test doubles for crews and LLM providers

pub mod mocks;

pub use mocks::{MockBackend, MockLlmProvider, RecordedDispatch};
