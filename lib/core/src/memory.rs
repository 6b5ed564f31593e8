//! In-memory corpus
//!
//! Implements every repository trait over maps guarded by `parking_lot`
//! locks. Used by tests, benches and hosts that keep the corpus resident.

use crate::repository::{CloneEdgeRepository, LineageRepository, SentenceRepository, UpsertOutcome};
use crate::{CloneEdge, CloneType, Error, LineageEdge, Result, Sentence, SentenceId, Vector};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct LineageIndex {
    parents: HashMap<SentenceId, LineageEdge>,
    children: HashMap<SentenceId, Vec<LineageEdge>>,
}

#[derive(Default)]
pub struct MemoryCorpus {
    sentences: RwLock<BTreeMap<SentenceId, Sentence>>,
    lineage: RwLock<LineageIndex>,
    clones: RwLock<HashMap<(SentenceId, SentenceId), CloneEdge>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a sentence
    pub fn add_sentence(&self, sentence: Sentence) {
        self.sentences.write().insert(sentence.id, sentence);
    }

    /// Link a child to its parent. A child has at most one parent.
    pub fn add_lineage(&self, edge: LineageEdge) -> Result<()> {
        let mut lineage = self.lineage.write();
        if let Some(existing) = lineage.parents.get(&edge.child_id) {
            return Err(Error::LineageConflict {
                child: edge.child_id,
                parent: existing.parent_id,
            });
        }
        lineage.parents.insert(edge.child_id, edge);
        let siblings = lineage.children.entry(edge.parent_id).or_default();
        siblings.push(edge);
        siblings.sort_by_key(|e| (e.order, e.child_id));
        Ok(())
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.clones.read().len()
    }

    /// All clone edges, sorted by (older, younger)
    pub fn clone_edges(&self) -> Vec<CloneEdge> {
        let mut edges: Vec<CloneEdge> = self.clones.read().values().copied().collect();
        edges.sort_by_key(|e| (e.older_clone_id, e.younger_clone_id));
        edges
    }
}

impl SentenceRepository for MemoryCorpus {
    fn get_by_id(&self, id: SentenceId) -> Result<Sentence> {
        self.sentences
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::SentenceNotFound(id))
    }

    fn get_all(&self) -> Result<Vec<Sentence>> {
        Ok(self.sentences.read().values().cloned().collect())
    }

    fn set_embedding(&self, id: SentenceId, embedding: Vector) -> Result<()> {
        let mut sentences = self.sentences.write();
        let sentence = sentences.get_mut(&id).ok_or(Error::SentenceNotFound(id))?;
        sentence.embedding = embedding;
        Ok(())
    }
}

impl LineageRepository for MemoryCorpus {
    fn get_parent_edge(&self, child_id: SentenceId) -> Result<Option<LineageEdge>> {
        Ok(self.lineage.read().parents.get(&child_id).copied())
    }

    fn get_child_edges(&self, parent_id: SentenceId) -> Result<Vec<LineageEdge>> {
        Ok(self
            .lineage
            .read()
            .children
            .get(&parent_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl CloneEdgeRepository for MemoryCorpus {
    fn find(&self, older: SentenceId, younger: SentenceId) -> Result<Option<CloneEdge>> {
        Ok(self.clones.read().get(&(older, younger)).copied())
    }

    fn insert(&self, edge: CloneEdge) -> Result<()> {
        let mut clones = self.clones.write();
        let key = (edge.older_clone_id, edge.younger_clone_id);
        if clones.contains_key(&key) || clones.contains_key(&(key.1, key.0)) {
            return Err(Error::CloneEdgeExists {
                older: key.0,
                younger: key.1,
            });
        }
        clones.insert(key, edge);
        Ok(())
    }

    fn update_distance(&self, older: SentenceId, younger: SentenceId, distance: f32) -> Result<()> {
        let mut clones = self.clones.write();
        let edge = clones
            .get_mut(&(older, younger))
            .ok_or(Error::CloneEdgeNotFound { older, younger })?;
        edge.distance = distance;
        Ok(())
    }

    fn update(&self, edge: CloneEdge) -> Result<()> {
        let mut clones = self.clones.write();
        let key = (edge.older_clone_id, edge.younger_clone_id);
        let slot = clones.get_mut(&key).ok_or(Error::CloneEdgeNotFound {
            older: key.0,
            younger: key.1,
        })?;
        *slot = edge;
        Ok(())
    }

    fn edges_for(&self, id: SentenceId) -> Result<Vec<CloneEdge>> {
        Ok(self
            .clones
            .read()
            .values()
            .filter(|e| e.touches(id))
            .copied()
            .collect())
    }

    /// Lookup and write under one write lock
    fn upsert_auto(&self, edge: CloneEdge) -> Result<UpsertOutcome> {
        let mut clones = self.clones.write();
        let forward = (edge.older_clone_id, edge.younger_clone_id);
        let backward = (forward.1, forward.0);

        let stored_key = [forward, backward]
            .into_iter()
            .find(|key| clones.contains_key(key));

        match stored_key.and_then(|key| clones.get_mut(&key)) {
            Some(existing) if existing.clone_type.is_refreshable() => {
                existing.distance = edge.distance;
                Ok(UpsertOutcome::Refreshed)
            }
            Some(_) => Ok(UpsertOutcome::Preserved),
            None => {
                clones.insert(forward, CloneEdge { clone_type: CloneType::Auto, ..edge });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}
