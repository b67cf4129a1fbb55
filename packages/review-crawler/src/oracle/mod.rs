//! Oracle implementations and their prompts.

pub mod ollama;
pub mod prompts;

pub use ollama::OllamaOracle;
