// Clone graph edges
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Sentence, SentenceId};

/// Distance recorded on user-asserted edges between sentences that could not
/// be compared (one of them has no embedding).
pub const UNMEASURED_DISTANCE: f32 = -1.0;

/// Who asserted a clone relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloneType {
    /// The younger sentence was created as a copy of the older one
    Creation,
    /// Computed by the clone graph maintainer; distance may be refreshed
    Auto,
    /// Linked by a user
    Manual,
}

impl CloneType {
    /// Only system-computed edges have their distance recomputed
    #[inline]
    pub fn is_refreshable(self) -> bool {
        self == CloneType::Auto
    }
}

impl fmt::Display for CloneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloneType::Creation => write!(f, "CREATION"),
            CloneType::Auto => write!(f, "AUTO"),
            CloneType::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Near-duplicate link between two sentences, keyed by (older, younger)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloneEdge {
    pub older_clone_id: SentenceId,
    pub younger_clone_id: SentenceId,
    pub distance: f32,
    pub clone_type: CloneType,
}

impl CloneEdge {
    #[inline]
    #[must_use]
    pub fn new(
        older_clone_id: SentenceId,
        younger_clone_id: SentenceId,
        distance: f32,
        clone_type: CloneType,
    ) -> Self {
        Self {
            older_clone_id,
            younger_clone_id,
            distance,
            clone_type,
        }
    }

    /// Edge between `a` and `b` with the earlier-created sentence as the older end
    #[must_use]
    pub fn between(a: &Sentence, b: &Sentence, distance: f32, clone_type: CloneType) -> Self {
        if a.is_older_than(b) {
            Self::new(a.id, b.id, distance, clone_type)
        } else {
            Self::new(b.id, a.id, distance, clone_type)
        }
    }

    #[inline]
    pub fn touches(&self, id: SentenceId) -> bool {
        self.older_clone_id == id || self.younger_clone_id == id
    }

    /// The end of the edge that is not `id`
    #[inline]
    pub fn other_end(&self, id: SentenceId) -> Option<SentenceId> {
        if self.older_clone_id == id {
            Some(self.younger_clone_id)
        } else if self.younger_clone_id == id {
            Some(self.older_clone_id)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_measured(&self) -> bool {
        self.distance >= 0.0
    }
}
