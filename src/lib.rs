//! # Schoolyard
//!
//! Clone detection for Schoolyard sentences: find paragraphs that paraphrase
//! each other using averaged word vectors and Euclidean distance, and keep a
//! clone graph up to date as the corpus changes.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! schoolyard import-vectors vectors.txt
//! schoolyard import-corpus corpus.json
//! schoolyard process --all
//! schoolyard clones 42 --max-distance 0.8
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use schoolyard::prelude::*;
//!
//! let manager = StorageManager::new("./data", StorageConfig::default()).unwrap();
//! let maintainer = manager.maintainer().unwrap();
//!
//! // After sentence 42 was created or edited:
//! let report = maintainer.process_sentence(42).unwrap();
//! println!("{} new clone edges", report.inserted);
//!
//! for edge in maintainer.clones_of(42, Some(0.8)).unwrap() {
//!     println!("{:?}", edge);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `schoolyard-core` - embeddings, distance, lineage exclusion, clone graph maintenance
//! - `schoolyard-storage` - LMDB persistence and importers

// Re-export core types
pub use schoolyard_core::{
    CloneEdge, CloneType, CloneGraphMaintainer, MaintainerConfig, InsertReport, RebuildReport,
    Sentence, SentenceId, SentenceEmbedder, Vector,
    LineageEdge, LineageExclusionResolver,
    InMemoryWordVectors, WordVectorStore, MemoryCorpus,
    SentenceRepository, LineageRepository, CloneEdgeRepository, UpsertOutcome,
    MaintenanceQueue, QueueConfig,
    euclidean_distance,
    Error, Result,
};

// Re-export storage
pub use schoolyard_storage::{StorageManager, StorageConfig, LmdbStorage, ImportSummary};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CloneEdge, CloneType, CloneGraphMaintainer, MaintainerConfig, InsertReport,
        Sentence, SentenceId, SentenceEmbedder, Vector,
        LineageEdge, InMemoryWordVectors, MemoryCorpus,
        SentenceRepository, LineageRepository, CloneEdgeRepository,
        MaintenanceQueue, QueueConfig,
        Error, Result,
        StorageManager, StorageConfig,
    };
}
