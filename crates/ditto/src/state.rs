use ahash::AHashMap;

use crate::{heap::HeapId, value::Value};

/// Identity map for a single top-level clone operation.
///
/// Maps source slot ids to their already-produced clones so that shared
/// references stay shared and cycles terminate. A fresh state is created per
/// top-level call and discarded afterwards; identity is never preserved
/// across calls.
#[derive(Debug, Default)]
pub struct CloneState {
    known_refs: AHashMap<HeapId, Value>,
    depth: usize,
}

impl CloneState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the clone already produced for a source slot, if any.
    #[must_use]
    pub fn get_known_ref(&self, source: HeapId) -> Option<&Value> {
        self.known_refs.get(&source)
    }

    /// Records the clone produced for a source slot.
    ///
    /// Recorded before the clone's own fields are filled in, so cycles back
    /// to `source` resolve to the in-progress clone.
    pub fn add_known_ref(&mut self, source: HeapId, clone: Value) {
        self.known_refs.insert(source, clone);
    }

    /// Number of source slots with a recorded clone.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known_refs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known_refs.is_empty()
    }

    pub(crate) fn enter(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}
