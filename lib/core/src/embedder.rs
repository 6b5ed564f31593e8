//! Sentence Embedder
//!
//! Turns sentence text into a single fixed-length vector: the arithmetic mean
//! of the vectors of the words that are in the vocabulary. Words without a
//! vector are skipped and do not count toward the mean.

use crate::word_vectors::WordVectorStore;
use crate::{Result, Vector};
use std::sync::Arc;
use tracing::warn;

/// Dimension of the word vectors Schoolyard ships with
pub const DEFAULT_DIMENSION: usize = 100;

/// Embeds sentences from a shared word vector store
#[derive(Clone)]
pub struct SentenceEmbedder {
    words: Arc<dyn WordVectorStore>,
}

impl SentenceEmbedder {
    pub fn new(words: Arc<dyn WordVectorStore>) -> Self {
        Self { words }
    }

    /// Dimension of every non-empty embedding this embedder produces
    pub fn dimension(&self) -> usize {
        self.words.dimension()
    }

    /// Split on runs of non-word characters. A word character is a Unicode
    /// alphanumeric or `_`; case is preserved.
    #[inline]
    pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
    }

    /// Embed `text`.
    ///
    /// Returns an empty vector when no token has a word vector; such a
    /// sentence is never a distance candidate.
    pub fn embed(&self, text: &str) -> Result<Vector> {
        let dimension = self.dimension();
        let mut accumulator = Vector::zeros(dimension);
        let mut matched = 0usize;

        for token in Self::tokenize(text) {
            let Some(word_vector) = self.words.lookup(token)? else {
                continue;
            };
            if word_vector.dim() != dimension {
                warn!(
                    token,
                    expected = dimension,
                    actual = word_vector.dim(),
                    "skipping word vector with wrong dimension"
                );
                continue;
            }
            accumulator.add_assign_slice(word_vector.as_slice());
            matched += 1;
        }

        if matched == 0 {
            return Ok(Vector::empty());
        }

        accumulator.divide(matched as f32);
        Ok(accumulator)
    }
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field("dimension", &self.dimension())
            .finish()
    }
}
