use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Vector;

pub type SentenceId = u64;

/// A user-authored paragraph in the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentence {
    pub id: SentenceId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Empty until the sentence has been embedded, and after embedding when
    /// none of its words had a vector.
    #[serde(default)]
    pub embedding: Vector,
}

impl Sentence {
    #[inline]
    #[must_use]
    pub fn new(id: SentenceId, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            created_at,
            embedding: Vector::empty(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vector) -> Self {
        self.embedding = embedding;
        self
    }

    #[inline]
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Whether `self` was created before `other`. Equal timestamps fall back
    /// to the id so that every pair has exactly one older member.
    #[inline]
    pub fn is_older_than(&self, other: &Sentence) -> bool {
        (self.created_at, self.id) < (other.created_at, other.id)
    }
}
