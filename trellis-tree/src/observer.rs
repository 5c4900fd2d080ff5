use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of structural change notifications for the flattened rows.
///
/// Offsets and counts always describe rows of the flattened projection as
/// they were right before the change (for removals) or right after it (for
/// insertions). Every method defaults to a no-op.
pub trait TreeObserver {
    /// Every row may have changed; re-read the whole projection.
    fn on_reset(&mut self) {}

    /// `count` rows were inserted starting at row `start`.
    fn on_range_inserted(&mut self, _start: usize, _count: usize) {}

    /// `count` rows were removed starting at row `start`.
    fn on_range_removed(&mut self, _start: usize, _count: usize) {}
}

impl TreeObserver for () {}

/// One recorded notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeChange {
    Reset,
    Inserted { start: usize, count: usize },
    Removed { start: usize, count: usize },
}

/// Observer that records every notification it receives.
///
/// Clones share the same log, so keep one clone and hand the other to the
/// adapter.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    changes: Arc<Mutex<Vec<TreeChange>>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded changes, oldest first.
    pub fn take(&self) -> Vec<TreeChange> {
        std::mem::take(&mut *self.lock())
    }

    /// Copy of the recorded changes without draining them.
    pub fn snapshot(&self) -> Vec<TreeChange> {
        self.lock().clone()
    }

    fn push(&self, change: TreeChange) {
        self.lock().push(change);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TreeChange>> {
        self.changes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TreeObserver for ChangeLog {
    fn on_reset(&mut self) {
        self.push(TreeChange::Reset);
    }

    fn on_range_inserted(&mut self, start: usize, count: usize) {
        self.push(TreeChange::Inserted { start, count });
    }

    fn on_range_removed(&mut self, start: usize, count: usize) {
        self.push(TreeChange::Removed { start, count });
    }
}
