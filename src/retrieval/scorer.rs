//! TF-IDF relevance scoring and top-k ranking over an indexed corpus.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::index::{Chunk, CorpusIndex};
use super::tokenizer::tokenize;

/// A chunk paired with its relevance score for a single query.
///
/// Scores are comparable only within one corpus snapshot; they are not
/// normalized and never persisted.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    /// The scored chunk, borrowed from the index.
    pub chunk: &'a Chunk,
    /// Non-negative relevance score; ranked results are always > 0.
    pub score: f64,
}

impl CorpusIndex {
    /// Ranks chunks by TF-IDF relevance to `query`, best first.
    ///
    /// Returns at most `top_k` chunks, all strictly positive; chunks sharing
    /// no token with the query are excluded. Ties keep corpus insertion
    /// order. A query with no recognizable tokens, or an empty corpus, yields
    /// an empty ranking rather than an error.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<ScoredChunk<'_>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<ScoredChunk<'_>> = self
            .chunks()
            .iter()
            .filter_map(|chunk| {
                let score = self.tf_idf(&query_tokens, chunk);
                (score > 0.0).then_some(ScoredChunk { chunk, score })
            })
            .collect();

        // sort_by is stable, so equal scores stay in insertion order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }

    /// Sums `tf * idf` over the query tokens present in `chunk`.
    ///
    /// `tf` is the token's share of the chunk's tokens; `idf` is
    /// `ln((N + 1) / (df + 1)) + 1`, smoothed so even corpus-absent tokens
    /// get a finite positive weight.
    fn tf_idf(&self, query_tokens: &[String], chunk: &Chunk) -> f64 {
        let chunk_tokens = tokenize(chunk.text());
        if chunk_tokens.is_empty() {
            return 0.0;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &chunk_tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let total = chunk_tokens.len() as f64;
        let n_chunks = self.chunk_count() as f64;

        query_tokens
            .iter()
            .map(|token| {
                let count = counts.get(token.as_str()).copied().unwrap_or(0);
                if count == 0 {
                    return 0.0;
                }
                let tf = count as f64 / total;
                let df = self.doc_frequency(token) as f64;
                let idf = ((n_chunks + 1.0) / (df + 1.0)).ln() + 1.0;
                tf * idf
            })
            .sum()
    }
}
