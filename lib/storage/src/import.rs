//! Importers for word vectors and corpus dumps
//!
//! Word vectors come in the word2vec text format. A corpus dump is the JSON
//! document the host exports from its relational store:
//!
//! ```json
//! {
//!   "sentences": [{"id": 1, "text": "...", "created_at": "2020-01-01T00:00:00Z"}],
//!   "lineage":   [{"parent_id": 1, "child_id": 2, "order": 0}],
//!   "clones":    [{"older_clone_id": 1, "younger_clone_id": 3,
//!                  "distance": 0.4, "clone_type": "MANUAL"}]
//! }
//! ```

use crate::lmdb_storage::LmdbStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use schoolyard_core::{
    CloneEdge, CloneEdgeRepository, Error, InMemoryWordVectors, LineageEdge, Sentence, SentenceId,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusDump {
    #[serde(default)]
    pub sentences: Vec<SentenceRecord>,
    #[serde(default)]
    pub lineage: Vec<LineageEdge>,
    #[serde(default)]
    pub clones: Vec<CloneEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub id: SentenceId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub sentences: usize,
    /// Sentences whose text changed; their embedding was cleared
    pub stale_embeddings: usize,
    pub lineage: usize,
    pub clones: usize,
}

/// Load a word2vec text file into the store
pub fn import_word_vectors<P: AsRef<Path>>(storage: &LmdbStorage, path: P) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let written = import_word_vectors_from(storage, BufReader::new(file))
        .with_context(|| format!("importing word vectors from {}", path.display()))?;
    info!(words = written, path = %path.display(), "word vectors imported");
    Ok(written)
}

pub fn import_word_vectors_from<R: BufRead>(storage: &LmdbStorage, reader: R) -> Result<usize> {
    let words = InMemoryWordVectors::from_word2vec_text(reader, storage.dimension())?;
    Ok(storage.put_word_vectors(words.iter())?)
}

/// Load a corpus JSON dump into the store
pub fn import_corpus<P: AsRef<Path>>(storage: &LmdbStorage, path: P) -> Result<ImportSummary> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let summary = import_corpus_from(storage, BufReader::new(file))
        .with_context(|| format!("importing corpus from {}", path.display()))?;
    info!(
        sentences = summary.sentences,
        lineage = summary.lineage,
        clones = summary.clones,
        path = %path.display(),
        "corpus imported"
    );
    Ok(summary)
}

/// Import a dump. Re-importing is safe: sentences whose text did not change
/// keep their embedding, and clone edges already present are overwritten.
pub fn import_corpus_from<R: Read>(storage: &LmdbStorage, reader: R) -> Result<ImportSummary> {
    let dump: CorpusDump = serde_json::from_reader(reader).context("parsing corpus JSON")?;
    let mut summary = ImportSummary::default();

    let mut sentences = Vec::with_capacity(dump.sentences.len());
    for record in dump.sentences {
        let mut sentence = Sentence::new(record.id, record.text, record.created_at);
        match storage.find_sentence(record.id)? {
            Some(existing) if existing.text == sentence.text => {
                sentence.embedding = existing.embedding;
            }
            Some(_) => summary.stale_embeddings += 1,
            None => {}
        }
        sentences.push(sentence);
    }
    summary.sentences = storage.put_sentences(&sentences)?;

    for edge in dump.lineage {
        storage
            .add_lineage(edge)
            .with_context(|| format!("linking {} -> {}", edge.parent_id, edge.child_id))?;
        summary.lineage += 1;
    }

    for edge in dump.clones {
        match storage.insert(edge) {
            Ok(()) => {}
            Err(Error::CloneEdgeExists { .. }) => {
                // keep whichever ordering is already stored
                let stored = storage
                    .find_either(edge.older_clone_id, edge.younger_clone_id)?
                    .context("clone edge vanished during import")?;
                storage.update(CloneEdge {
                    distance: edge.distance,
                    clone_type: edge.clone_type,
                    ..stored
                })?;
            }
            Err(e) => return Err(e.into()),
        }
        summary.clones += 1;
    }

    Ok(summary)
}
