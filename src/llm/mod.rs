//! LLM provider abstraction layer
//!
//! Provider-agnostic completion interface with OpenAI and Anthropic
//! implementations.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
