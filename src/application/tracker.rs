//! Reuse tracking: which manipulators a template already carries

use std::collections::HashSet;

use crate::application::manipulator::Manipulator;
use crate::domain::ManipulatorId;

/// Set of manipulator ids already applied into a template tree.
///
/// Identity is the manipulator's id, so reordering or removing pending
/// entries never shifts what counts as applied.
#[derive(Debug, Clone, Default)]
pub struct ReuseTracker {
    applied: HashSet<ManipulatorId>,
}

impl ReuseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending manipulators not applied yet, in pending order.
    pub fn active<'a>(&self, pending: &'a [Manipulator]) -> Vec<&'a Manipulator> {
        pending
            .iter()
            .filter(|m| !self.applied.contains(&m.id()))
            .collect()
    }

    pub fn mark_applied(&mut self, ids: impl IntoIterator<Item = ManipulatorId>) {
        self.applied.extend(ids);
    }

    pub fn is_applied(&self, id: ManipulatorId) -> bool {
        self.applied.contains(&id)
    }

    /// Any pending manipulator not applied yet.
    pub fn is_dirty(&self, pending: &[Manipulator]) -> bool {
        pending.iter().any(|m| !self.applied.contains(&m.id()))
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
