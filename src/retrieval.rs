//! Local lexical retrieval: chunked corpus indexing and TF-IDF ranking.
//!
//! The index is built eagerly from a docs directory and never mutated; every
//! query tokenizes, scores each chunk against the query, and returns the
//! top-k ranked chunks.

mod index;
mod scorer;
mod tokenizer;

pub use index::{Chunk, CorpusIndex, DEFAULT_CHUNK_SIZE};
pub use scorer::ScoredChunk;
pub use tokenizer::tokenize;
