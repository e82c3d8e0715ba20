//! Runtime configuration assembled by the binary and passed at construction.

use std::path::PathBuf;

use crate::retrieval::DEFAULT_CHUNK_SIZE;

/// Default generation backend endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "llama3:8b";

/// Default documents directory, relative to the working directory.
pub const DEFAULT_DOCS_DIR: &str = "docs";

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Default bound on answer revision rounds.
pub const DEFAULT_MAX_REVISION_ROUNDS: usize = 1;

/// Everything the pipeline needs to know, resolved once at startup.
///
/// The binary fills this from CLI flags (with `OLLAMA_HOST` / `OLLAMA_MODEL`
/// env fallbacks) and hands it to construction; nothing reads global state
/// afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the generation backend.
    pub base_url: String,
    /// Model identifier sent with every generation request.
    pub model: String,
    /// Directory of markdown/plain-text documents to index.
    pub docs_dir: PathBuf,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Maximum number of revision rounds per question.
    pub max_revision_rounds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            max_revision_rounds: DEFAULT_MAX_REVISION_ROUNDS,
        }
    }
}
