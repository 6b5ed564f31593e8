//! Host-provided storage seams
//!
//! The maintainer reads sentences and lineage and writes clone edges only
//! through these traits. [`crate::memory::MemoryCorpus`] implements all three
//! in memory; `schoolyard-storage` implements them over LMDB.

use crate::{CloneEdge, Error, LineageEdge, Result, Sentence, SentenceId, Vector};

pub trait SentenceRepository: Send + Sync {
    /// Fails with [`Error::SentenceNotFound`] for unknown ids
    fn get_by_id(&self, id: SentenceId) -> Result<Sentence>;

    fn get_all(&self) -> Result<Vec<Sentence>>;

    /// Persist a freshly computed embedding
    fn set_embedding(&self, id: SentenceId, embedding: Vector) -> Result<()>;
}

pub trait LineageRepository: Send + Sync {
    /// The edge naming `child_id`'s parent, if it has one
    fn get_parent_edge(&self, child_id: SentenceId) -> Result<Option<LineageEdge>>;

    /// Edges to every child of `parent_id`, in `order`
    fn get_child_edges(&self, parent_id: SentenceId) -> Result<Vec<LineageEdge>>;
}

/// What an upsert did to the edge between a pair of sentences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// An AUTO edge had its distance replaced
    Refreshed,
    /// A MANUAL or CREATION edge was left as it was
    Preserved,
}

pub trait CloneEdgeRepository: Send + Sync {
    /// Edge stored under exactly this (older, younger) ordering
    fn find(&self, older: SentenceId, younger: SentenceId) -> Result<Option<CloneEdge>>;

    /// Fails with [`Error::CloneEdgeExists`] if the pair already has an edge
    /// in either ordering.
    fn insert(&self, edge: CloneEdge) -> Result<()>;

    fn update_distance(&self, older: SentenceId, younger: SentenceId, distance: f32) -> Result<()>;

    /// Replace an existing edge's distance and type
    fn update(&self, edge: CloneEdge) -> Result<()>;

    /// Every edge with `id` at either end
    fn edges_for(&self, id: SentenceId) -> Result<Vec<CloneEdge>>;

    /// Edge between `a` and `b` regardless of which one is stored as older
    fn find_either(&self, a: SentenceId, b: SentenceId) -> Result<Option<CloneEdge>> {
        match self.find(a, b)? {
            Some(edge) => Ok(Some(edge)),
            None => self.find(b, a),
        }
    }

    /// Insert `edge` as a new AUTO edge, or refresh the distance of the
    /// existing edge for the pair when that edge is AUTO.
    ///
    /// This default runs separate reads and writes. Stores that can do it
    /// atomically should override it; a lost insert race still surfaces as
    /// [`Error::CloneEdgeExists`] and is resolved by re-reading.
    fn upsert_auto(&self, edge: CloneEdge) -> Result<UpsertOutcome> {
        let (a, b) = (edge.older_clone_id, edge.younger_clone_id);

        if let Some(existing) = self.find_either(a, b)? {
            return refresh_if_auto(self, &existing, edge.distance);
        }

        match self.insert(CloneEdge { clone_type: crate::CloneType::Auto, ..edge }) {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            Err(Error::CloneEdgeExists { .. }) => {
                let existing = self
                    .find_either(a, b)?
                    .ok_or(Error::CloneEdgeNotFound { older: a, younger: b })?;
                refresh_if_auto(self, &existing, edge.distance)
            }
            Err(e) => Err(e),
        }
    }
}

fn refresh_if_auto<R: CloneEdgeRepository + ?Sized>(
    repo: &R,
    existing: &CloneEdge,
    distance: f32,
) -> Result<UpsertOutcome> {
    if existing.clone_type.is_refreshable() {
        repo.update_distance(existing.older_clone_id, existing.younger_clone_id, distance)?;
        Ok(UpsertOutcome::Refreshed)
    } else {
        Ok(UpsertOutcome::Preserved)
    }
}
