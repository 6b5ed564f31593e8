//! Clone graph maintenance
//!
//! [`CloneGraphMaintainer::insert_distances`] compares one sentence with the
//! rest of the corpus and upserts AUTO clone edges. Sentences related by
//! lineage are never compared, sentences without an embedding never take
//! part, and edges a user asserted (MANUAL or CREATION) keep their distance.
//!
//! Passes are serialized per maintainer; each per-pair upsert is delegated to
//! [`CloneEdgeRepository::upsert_auto`], which stores make atomic.

use crate::clone_edge::UNMEASURED_DISTANCE;
use crate::embedder::{SentenceEmbedder, DEFAULT_DIMENSION};
use crate::lineage::LineageExclusionResolver;
use crate::repository::{CloneEdgeRepository, LineageRepository, SentenceRepository, UpsertOutcome};
use crate::{CloneEdge, CloneType, Error, Result, SentenceId};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for a maintainer
#[derive(Debug, Clone)]
pub struct MaintainerConfig {
    /// Dimension every sentence embedding must have
    pub dimension: usize,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl MaintainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".to_string()));
        }
        Ok(())
    }
}

/// Tally of one `insert_distances` pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    /// Sentences the target was compared with
    pub candidates: usize,
    pub inserted: usize,
    pub refreshed: usize,
    pub preserved: usize,
    /// Candidates dropped because of a dimension mismatch or store failure
    pub skipped: usize,
}

impl InsertReport {
    fn absorb(&mut self, other: InsertReport) {
        self.candidates += other.candidates;
        self.inserted += other.inserted;
        self.refreshed += other.refreshed;
        self.preserved += other.preserved;
        self.skipped += other.skipped;
    }
}

/// Tally of a whole-corpus rebuild
#[derive(Debug, Default, Clone, Serialize)]
pub struct RebuildReport {
    pub processed: usize,
    pub failed: Vec<(SentenceId, String)>,
    pub totals: InsertReport,
}

pub struct CloneGraphMaintainer {
    embedder: SentenceEmbedder,
    sentences: Arc<dyn SentenceRepository>,
    exclusions: LineageExclusionResolver,
    clones: Arc<dyn CloneEdgeRepository>,
    pub(crate) write_lock: Mutex<()>,
}

impl CloneGraphMaintainer {
    pub fn new(
        config: MaintainerConfig,
        embedder: SentenceEmbedder,
        sentences: Arc<dyn SentenceRepository>,
        lineage: Arc<dyn LineageRepository>,
        clones: Arc<dyn CloneEdgeRepository>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.dimension {
            return Err(Error::InvalidConfig(format!(
                "word vectors have dimension {}, maintainer expects {}",
                embedder.dimension(),
                config.dimension
            )));
        }

        Ok(Self {
            embedder,
            sentences,
            exclusions: LineageExclusionResolver::new(lineage),
            clones,
            write_lock: Mutex::new(()),
        })
    }

    /// Maintainer over a single store that holds sentences, lineage and edges
    pub fn over<S>(config: MaintainerConfig, embedder: SentenceEmbedder, store: Arc<S>) -> Result<Self>
    where
        S: SentenceRepository + LineageRepository + CloneEdgeRepository + 'static,
    {
        Self::new(config, embedder, store.clone(), store.clone(), store)
    }

    pub fn embedder(&self) -> &SentenceEmbedder {
        &self.embedder
    }

    /// Recompute distances between `sentence_id` and every eligible sentence
    /// and upsert AUTO edges.
    ///
    /// Fails only when the sentence does not exist or the corpus cannot be
    /// read. A target without an embedding is a no-op.
    pub fn insert_distances(&self, sentence_id: SentenceId) -> Result<InsertReport> {
        let _guard = self.write_lock.lock();
        self.insert_distances_locked(sentence_id)
    }

    /// Embed the sentence's current text, store the embedding, then run
    /// [`Self::insert_distances`]. Call after a sentence is created or its
    /// text changes.
    pub fn process_sentence(&self, sentence_id: SentenceId) -> Result<InsertReport> {
        let _guard = self.write_lock.lock();
        self.process_sentence_locked(sentence_id)
    }

    /// Re-embed every sentence and refresh the whole graph. Failures are
    /// collected per sentence.
    pub fn rebuild_all(&self) -> Result<RebuildReport> {
        let _guard = self.write_lock.lock();
        let ids: Vec<SentenceId> = self.sentences.get_all()?.iter().map(|s| s.id).collect();

        // Embed everything first so every pass sees the final embeddings.
        let mut report = RebuildReport::default();
        let mut embedded = Vec::with_capacity(ids.len());
        for id in ids {
            match self.embed_and_store(id) {
                Ok(()) => embedded.push(id),
                Err(e) => {
                    warn!(sentence = id, error = %e, "failed to embed sentence");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        for id in embedded {
            match self.insert_distances_locked(id) {
                Ok(pass) => {
                    report.processed += 1;
                    report.totals.absorb(pass);
                }
                Err(e) => {
                    warn!(sentence = id, error = %e, "failed to maintain clone edges");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        info!(
            processed = report.processed,
            failed = report.failed.len(),
            inserted = report.totals.inserted,
            refreshed = report.totals.refreshed,
            "clone graph rebuilt"
        );
        Ok(report)
    }

    /// Record a user-asserted clone relationship between `a` and `b`.
    ///
    /// An edge already linking the pair is re-tagged with `clone_type`.
    pub fn record_clone(&self, a: SentenceId, b: SentenceId, clone_type: CloneType) -> Result<CloneEdge> {
        if clone_type == CloneType::Auto {
            return Err(Error::InvalidConfig(
                "AUTO edges are computed, not recorded".to_string(),
            ));
        }
        if a == b {
            return Err(Error::InvalidConfig(format!("sentence {} cannot clone itself", a)));
        }

        let _guard = self.write_lock.lock();
        let first = self.sentences.get_by_id(a)?;
        let second = self.sentences.get_by_id(b)?;

        let distance = if first.has_embedding() && second.has_embedding() {
            first.embedding.l2_distance(&second.embedding).unwrap_or_else(|e| {
                warn!(a, b, error = %e, "recording clone without a distance");
                UNMEASURED_DISTANCE
            })
        } else {
            UNMEASURED_DISTANCE
        };

        let edge = match self.clones.find_either(a, b)? {
            Some(existing) => {
                let edge = CloneEdge {
                    distance,
                    clone_type,
                    ..existing
                };
                self.clones.update(edge)?;
                edge
            }
            None => {
                let edge = CloneEdge::between(&first, &second, distance, clone_type);
                self.clones.insert(edge)?;
                edge
            }
        };

        info!(
            older = edge.older_clone_id,
            younger = edge.younger_clone_id,
            clone_type = %clone_type,
            "clone recorded"
        );
        Ok(edge)
    }

    /// See [`clones_of`]
    pub fn clones_of(&self, sentence_id: SentenceId, max_distance: Option<f32>) -> Result<Vec<CloneEdge>> {
        clones_of(self.clones.as_ref(), sentence_id, max_distance)
    }

    fn process_sentence_locked(&self, sentence_id: SentenceId) -> Result<InsertReport> {
        self.embed_and_store(sentence_id)?;
        self.insert_distances_locked(sentence_id)
    }

    fn embed_and_store(&self, sentence_id: SentenceId) -> Result<()> {
        let sentence = self.sentences.get_by_id(sentence_id)?;
        let embedding = self.embedder.embed(&sentence.text)?;
        if embedding.is_empty() {
            debug!(sentence = sentence_id, "no known words, storing empty embedding");
        }
        self.sentences.set_embedding(sentence_id, embedding)
    }

    fn insert_distances_locked(&self, sentence_id: SentenceId) -> Result<InsertReport> {
        let target = self.sentences.get_by_id(sentence_id)?;
        let mut report = InsertReport::default();

        if !target.has_embedding() {
            debug!(sentence = sentence_id, "no embedding, nothing to compare");
            return Ok(report);
        }

        let excluded = self.exclusions.excluded_ids(sentence_id)?;

        for other in self.sentences.get_all()? {
            if other.id == sentence_id || !other.has_embedding() || excluded.contains(&other.id) {
                continue;
            }
            report.candidates += 1;

            let distance = match target.embedding.l2_distance(&other.embedding) {
                Ok(distance) => distance,
                Err(e) => {
                    warn!(sentence = sentence_id, other = other.id, error = %e, "skipping clone candidate");
                    report.skipped += 1;
                    continue;
                }
            };

            let edge = CloneEdge::between(&target, &other, distance, CloneType::Auto);
            match self.clones.upsert_auto(edge) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Refreshed) => report.refreshed += 1,
                Ok(UpsertOutcome::Preserved) => report.preserved += 1,
                Err(e) => {
                    warn!(sentence = sentence_id, other = other.id, error = %e, "clone edge upsert failed");
                    report.skipped += 1;
                }
            }
        }

        debug!(
            sentence = sentence_id,
            excluded = excluded.len(),
            candidates = report.candidates,
            inserted = report.inserted,
            refreshed = report.refreshed,
            preserved = report.preserved,
            skipped = report.skipped,
            "distances inserted"
        );
        Ok(report)
    }
}

/// Clone edges touching `sentence_id`, nearest first. With `max_distance`,
/// only measured edges within it are returned; otherwise unmeasured edges
/// come last.
///
/// Reads stored edges only, so no word vectors are needed.
pub fn clones_of<R>(clones: &R, sentence_id: SentenceId, max_distance: Option<f32>) -> Result<Vec<CloneEdge>>
where
    R: CloneEdgeRepository + ?Sized,
{
    let mut edges = clones.edges_for(sentence_id)?;
    if let Some(max) = max_distance {
        edges.retain(|e| e.is_measured() && e.distance <= max);
    }
    edges.sort_by(|a, b| {
        b.is_measured()
            .cmp(&a.is_measured())
            .then(a.distance.total_cmp(&b.distance))
            .then(a.other_end(sentence_id).cmp(&b.other_end(sentence_id)))
    });
    Ok(edges)
}
