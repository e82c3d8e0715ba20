pub mod agents;
pub mod config;
pub mod ollama;
pub mod retrieval;

pub use agents::{AnswerStyle, ContextEntry, Critique, Orchestrator, OrchestratorBuilder, Plan, RunResult};
pub use config::Config;
pub use ollama::{GenerationClient, OllamaClient, OllamaClientBuilder, OllamaError};
pub use retrieval::{Chunk, CorpusIndex, ScoredChunk};
