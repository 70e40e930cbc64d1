pub mod client;
pub mod parse;

pub use client::{LlmError, OllamaClient};
pub use parse::{Suggestion, parse_suggestions};
