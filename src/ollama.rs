//! Generation backend boundary.
//!
//! A blocking HTTP client for an Ollama-compatible text-completion service,
//! with error handling, retry logic, and timeout configuration.

mod client;

pub use client::{GenerationClient, OllamaClient, OllamaClientBuilder, OllamaError};
