use crate::SentenceId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Sentence not found: {0}")]
    SentenceNotFound(SentenceId),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty embedding")]
    EmptyEmbedding,

    #[error("Clone edge already exists: {older} -> {younger}")]
    CloneEdgeExists { older: SentenceId, younger: SentenceId },

    #[error("Clone edge not found: {older} -> {younger}")]
    CloneEdgeNotFound { older: SentenceId, younger: SentenceId },

    #[error("Sentence {child} already has parent {parent}")]
    LineageConflict { child: SentenceId, parent: SentenceId },

    #[error("Maintenance queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("Maintenance queue is shut down")]
    QueueClosed,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
