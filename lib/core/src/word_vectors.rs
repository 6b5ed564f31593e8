//! Word vector lookup
//!
//! The embedder only ever needs point lookups, so storage backends implement
//! [`WordVectorStore`]. [`InMemoryWordVectors`] is the immutable hash map a
//! process loads once at startup and shares behind an `Arc`.

use crate::{Error, Result, Vector};
use ahash::AHashMap;
use std::io::BufRead;

/// Point lookup from a word token to its vector
pub trait WordVectorStore: Send + Sync {
    /// Dimension shared by every vector in the store
    fn dimension(&self) -> usize;

    /// Vector for `word`, or `None` when the word is out of vocabulary.
    /// Tokens are matched exactly; no case folding happens here.
    fn lookup(&self, word: &str) -> Result<Option<Vector>>;
}

/// Word vectors held in memory
#[derive(Debug, Clone)]
pub struct InMemoryWordVectors {
    dimension: usize,
    vectors: AHashMap<String, Vector>,
}

impl InMemoryWordVectors {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: AHashMap::new(),
        }
    }

    /// Insert a word vector, rejecting vectors of the wrong dimension
    pub fn insert(&mut self, word: impl Into<String>, vector: Vector) -> Result<()> {
        if vector.dim() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dim(),
            });
        }
        self.vectors.insert(word.into(), vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vector)> {
        self.vectors.iter().map(|(word, v)| (word.as_str(), v))
    }

    /// Parse the word2vec text format.
    ///
    /// An optional first line `"<count> <dim>"` is accepted and its dimension
    /// checked; every other non-blank line is `word f1 f2 ... fD`.
    pub fn from_word2vec_text<R: BufRead>(reader: R, dimension: usize) -> Result<Self> {
        let mut store = Self::new(dimension);

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();

            if index == 0 && rest.len() == 1 {
                if let (Ok(_), Ok(header_dim)) = (word.parse::<usize>(), rest[0].parse::<usize>()) {
                    if header_dim != dimension {
                        return Err(Error::InvalidConfig(format!(
                            "word vector file has dimension {}, expected {}",
                            header_dim, dimension
                        )));
                    }
                    continue;
                }
            }

            let values = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Serialization(format!("line {}: {}", line_no, e)))?;

            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(Error::Serialization(format!(
                    "line {}: word '{}' has non-finite component {}",
                    line_no, word, bad
                )));
            }

            if values.len() != dimension {
                return Err(Error::Serialization(format!(
                    "line {}: word '{}' has {} components, expected {}",
                    line_no,
                    word,
                    values.len(),
                    dimension
                )));
            }

            store.vectors.insert(word.to_string(), Vector::new(values));
        }

        Ok(store)
    }
}

impl WordVectorStore for InMemoryWordVectors {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn lookup(&self, word: &str) -> Result<Option<Vector>> {
        Ok(self.vectors.get(word).cloned())
    }
}
