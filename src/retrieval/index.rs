//! Corpus construction: document chunking and the document-frequency table.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::tokenizer::tokenize;

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 700;

/// File extensions recognized as corpus documents.
const DOC_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// A bounded-length contiguous piece of a source document.
///
/// Chunks are the atomic unit of retrieval. They are created once during
/// indexing and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    source: String,
    text: String,
}

impl Chunk {
    /// Returns the name of the document this chunk was cut from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the chunk text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The in-memory retrievable corpus: the chunk set plus a table counting, for
/// each token, how many chunks contain it at least once.
///
/// Built eagerly at construction and read-only for the rest of the process
/// lifetime, so concurrent reads would be safe if ever needed.
#[derive(Debug)]
pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    doc_frequency: HashMap<String, usize>,
}

impl CorpusIndex {
    /// Builds an index from the markdown and plain-text files directly inside
    /// `docs_dir` (non-recursive).
    ///
    /// A missing directory yields an empty index rather than an error, and so
    /// does a directory with no matching files. Files that cannot be read are
    /// skipped with a warning; file contents are decoded lossily so invalid
    /// UTF-8 never fails a build. Files are visited in name order so chunk
    /// insertion order is deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or the directory cannot be
    /// listed.
    pub fn build(docs_dir: &Path, chunk_size: usize) -> Result<Self> {
        if !docs_dir.is_dir() {
            debug!(docs_dir = %docs_dir.display(), "docs directory missing, indexing empty corpus");
            return Self::from_documents(std::iter::empty::<(String, String)>(), chunk_size);
        }

        let mut paths: Vec<_> = fs::read_dir(docs_dir)
            .with_context(|| format!("Failed to list docs directory: {}", docs_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_doc_extension(path))
            .collect();
        paths.sort();

        let documents = paths.into_iter().filter_map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match fs::read(&path) {
                Ok(bytes) => Some((name, String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            }
        });

        Self::from_documents(documents, chunk_size)
    }

    /// Builds an index directly from `(source, content)` pairs.
    ///
    /// Chunking and document-frequency counting behave exactly as in
    /// [`CorpusIndex::build`]; this is the entry point when the corpus does
    /// not live on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero.
    pub fn from_documents<I, S, T>(documents: I, chunk_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        if chunk_size == 0 {
            anyhow::bail!("chunk size must be at least 1 character");
        }

        let mut chunks = Vec::new();
        for (source, content) in documents {
            let source = source.into();
            for text in split_chunks(content.as_ref(), chunk_size) {
                chunks.push(Chunk {
                    source: source.clone(),
                    text,
                });
            }
        }

        let mut doc_frequency: HashMap<String, usize> = HashMap::new();
        for chunk in &chunks {
            let unique: HashSet<String> = tokenize(&chunk.text).into_iter().collect();
            for term in unique {
                *doc_frequency.entry(term).or_insert(0) += 1;
            }
        }

        debug!(
            chunks = chunks.len(),
            terms = doc_frequency.len(),
            "corpus index built"
        );

        Ok(Self {
            chunks,
            doc_frequency,
        })
    }

    /// Returns every chunk in corpus insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns the total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the number of chunks containing `term` at least once, or 0 for
    /// terms never seen during indexing.
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.doc_frequency.get(term).copied().unwrap_or(0)
    }

    /// Returns true when the corpus holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Returns true for paths with a recognized document extension.
fn has_doc_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOC_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}

/// Splits trimmed content into consecutive non-overlapping pieces of at most
/// `chunk_size` characters; the last piece may be shorter.
///
/// Splitting counts characters, not bytes, so multi-byte text never breaks
/// mid-codepoint. Empty (or whitespace-only) content yields no pieces.
fn split_chunks(content: &str, chunk_size: usize) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|piece| piece.iter().collect())
        .collect()
}
