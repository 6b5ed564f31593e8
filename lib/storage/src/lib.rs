//! # Schoolyard Storage
//!
//! LMDB persistence for the clone detection corpus: word vectors, sentences,
//! lineage and clone edges, plus importers for word2vec files and corpus
//! dumps.

pub mod manager;
pub mod lmdb_storage;
pub mod import;

pub use manager::{StorageConfig, StorageManager};
pub use lmdb_storage::{LmdbStorage, DEFAULT_MAP_SIZE};
pub use import::{CorpusDump, ImportSummary, SentenceRecord};
