//! The user's set of selected cells.

use std::collections::BTreeSet;

use nbs_common::CellKey;
use serde::{Deserialize, Serialize};

/// Selected cell keys.
///
/// Independent of viewport membership: a selected cell may lie outside the
/// current viewport and still keeps its scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    keys: BTreeSet<CellKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `true` if the key was not already selected.
    pub fn insert(&mut self, key: CellKey) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: &CellKey) -> bool {
        self.keys.remove(key)
    }

    /// Flip a key's membership. Returns whether it is now selected.
    pub fn toggle(&mut self, key: CellKey) -> bool {
        if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Extend<CellKey> for Selection {
    fn extend<I: IntoIterator<Item = CellKey>>(&mut self, iter: I) {
        self.keys.extend(iter);
    }
}

impl FromIterator<CellKey> for Selection {
    fn from_iter<I: IntoIterator<Item = CellKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
