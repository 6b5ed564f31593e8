//! # Schoolyard Core
//!
//! Clone detection for Schoolyard sentences.
//!
//! This crate finds near-duplicate paragraphs ("clones") in a corpus of
//! user-authored sentences:
//!
//! - [`SentenceEmbedder`] - averages word vectors into one embedding per sentence
//! - [`euclidean_distance`] - dissimilarity between two embeddings
//! - [`LineageExclusionResolver`] - parent, siblings and children are never clones
//! - [`CloneGraphMaintainer`] - keeps the clone graph up to date as sentences change
//! - [`MaintenanceQueue`] - single background worker running maintenance passes
//!
//! Storage is reached through the traits in [`repository`]; [`MemoryCorpus`]
//! implements them in memory.
//!
//! ## Example
//!
//! ```rust
//! use schoolyard_core::{
//!     CloneGraphMaintainer, InMemoryWordVectors, MaintainerConfig, MemoryCorpus,
//!     Sentence, SentenceEmbedder, Vector,
//! };
//! use std::sync::Arc;
//!
//! let mut words = InMemoryWordVectors::new(2);
//! words.insert("cat", Vector::new(vec![1.0, 0.0])).unwrap();
//! words.insert("dog", Vector::new(vec![0.0, 1.0])).unwrap();
//! let embedder = SentenceEmbedder::new(Arc::new(words));
//!
//! let corpus = Arc::new(MemoryCorpus::new());
//! corpus.add_sentence(Sentence::new(1, "A cat.", chrono::Utc::now()));
//! corpus.add_sentence(Sentence::new(2, "A cat and a dog.", chrono::Utc::now()));
//!
//! let config = MaintainerConfig { dimension: 2 };
//! let maintainer = CloneGraphMaintainer::over(config, embedder, corpus.clone()).unwrap();
//! maintainer.process_sentence(1).unwrap();
//! maintainer.process_sentence(2).unwrap();
//!
//! assert_eq!(corpus.edge_count(), 1);
//! ```

pub mod error;
pub mod vector;
pub mod distance;
pub mod word_vectors;
pub mod embedder;
pub mod sentence;
pub mod lineage;
pub mod clone_edge;
pub mod repository;
pub mod memory;
pub mod maintainer;
pub mod queue;

pub use error::{Error, Result};
pub use vector::Vector;
pub use distance::euclidean_distance;
pub use word_vectors::{InMemoryWordVectors, WordVectorStore};
pub use embedder::{SentenceEmbedder, DEFAULT_DIMENSION};
pub use sentence::{Sentence, SentenceId};
pub use lineage::{LineageEdge, LineageExclusionResolver};
pub use clone_edge::{CloneEdge, CloneType, UNMEASURED_DISTANCE};
pub use repository::{CloneEdgeRepository, LineageRepository, SentenceRepository, UpsertOutcome};
pub use memory::MemoryCorpus;
pub use maintainer::{clones_of, CloneGraphMaintainer, InsertReport, MaintainerConfig, RebuildReport};
pub use queue::{MaintenanceQueue, QueueConfig, DEFAULT_QUEUE_CAPACITY};
