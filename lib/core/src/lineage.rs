use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::repository::LineageRepository;
use crate::{Result, SentenceId};

/// Parent/child decomposition link: `child_id` explains part of `parent_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageEdge {
    pub parent_id: SentenceId,
    pub child_id: SentenceId,
    /// Position of the child among its siblings
    pub order: u32,
}

impl LineageEdge {
    #[inline]
    #[must_use]
    pub fn new(parent_id: SentenceId, child_id: SentenceId, order: u32) -> Self {
        Self {
            parent_id,
            child_id,
            order,
        }
    }
}

/// Computes the sentences that are related to a sentence by composition and
/// therefore never count as its clones: its parent, its siblings and its
/// children.
#[derive(Clone)]
pub struct LineageExclusionResolver {
    lineage: Arc<dyn LineageRepository>,
}

impl LineageExclusionResolver {
    pub fn new(lineage: Arc<dyn LineageRepository>) -> Self {
        Self { lineage }
    }

    /// Ids excluded from clone comparison with `sentence_id`. The sentence
    /// itself is not part of the set.
    pub fn excluded_ids(&self, sentence_id: SentenceId) -> Result<HashSet<SentenceId>> {
        let mut excluded = HashSet::new();

        if let Some(parent_edge) = self.lineage.get_parent_edge(sentence_id)? {
            excluded.insert(parent_edge.parent_id);
            for sibling in self.lineage.get_child_edges(parent_edge.parent_id)? {
                excluded.insert(sibling.child_id);
            }
        }

        for child in self.lineage.get_child_edges(sentence_id)? {
            excluded.insert(child.child_id);
        }

        excluded.remove(&sentence_id);
        Ok(excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCorpus;

    fn family() -> Arc<MemoryCorpus> {
        // 1 -> [2, 3], 3 -> [4], 5 on its own
        let corpus = MemoryCorpus::new();
        corpus.add_lineage(LineageEdge::new(1, 2, 0)).unwrap();
        corpus.add_lineage(LineageEdge::new(1, 3, 1)).unwrap();
        corpus.add_lineage(LineageEdge::new(3, 4, 0)).unwrap();
        Arc::new(corpus)
    }

    fn set(ids: &[SentenceId]) -> HashSet<SentenceId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_child_excludes_parent_and_siblings() {
        let resolver = LineageExclusionResolver::new(family());
        assert_eq!(resolver.excluded_ids(2).unwrap(), set(&[1, 3]));
    }

    #[test]
    fn test_parent_excludes_children() {
        let resolver = LineageExclusionResolver::new(family());
        assert_eq!(resolver.excluded_ids(1).unwrap(), set(&[2, 3]));
    }

    #[test]
    fn test_middle_generation_excludes_both_directions() {
        let resolver = LineageExclusionResolver::new(family());
        assert_eq!(resolver.excluded_ids(3).unwrap(), set(&[1, 2, 4]));
    }

    #[test]
    fn test_grandchildren_are_not_excluded() {
        let resolver = LineageExclusionResolver::new(family());
        assert!(!resolver.excluded_ids(1).unwrap().contains(&4));
    }

    #[test]
    fn test_unrelated_sentence_excludes_nothing() {
        let resolver = LineageExclusionResolver::new(family());
        assert!(resolver.excluded_ids(5).unwrap().is_empty());
    }
}
