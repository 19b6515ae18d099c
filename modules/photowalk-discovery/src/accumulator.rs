//! Newest-first, duplicate-free list of photos found in a session.

use std::collections::{HashSet, VecDeque};

use photowalk_common::PhotoReference;

#[derive(Debug, Default)]
pub struct Accumulator {
    order: VecDeque<PhotoReference>,
    seen: HashSet<PhotoReference>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `reference` at the front. Callers check [`Accumulator::contains`]
    /// first; the list is never re-checked here.
    pub fn prepend(&mut self, reference: PhotoReference) {
        debug_assert!(!self.seen.contains(&reference), "duplicate prepend: {reference}");
        self.seen.insert(reference.clone());
        self.order.push_front(reference);
    }

    pub fn contains(&self, reference: &PhotoReference) -> bool {
        self.seen.contains(reference)
    }

    /// Independent copy of the current list, newest first.
    pub fn snapshot(&self) -> Vec<PhotoReference> {
        self.order.iter().cloned().collect()
    }

    /// Every reference accumulated so far, for dedup lookups.
    pub fn seen(&self) -> &HashSet<PhotoReference> {
        &self.seen
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
