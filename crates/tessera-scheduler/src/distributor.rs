//! Dedup'd distribution of a fixed work sequence to concurrent consumers.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tessera_core::{WorkItem, WorkProgress};
use tracing::{debug, info};

struct DistributorState {
    queue: VecDeque<WorkItem>,
    in_progress: HashSet<usize>,
    completed: HashSet<usize>,
}

/// Thread-safe work queue keyed by each item's ordinal index.
///
/// An index is in at most one of queued, in-progress or completed at a time,
/// and the completed set only grows. Failed items are dropped, not requeued.
pub struct WorkDistributor {
    state: Mutex<DistributorState>,
}

impl WorkDistributor {
    /// Create a distributor over `items`, handed out in order.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let queue: VecDeque<WorkItem> = items.into_iter().collect();
        info!(items = queue.len(), "initialized work distributor");
        Self {
            state: Mutex::new(DistributorState {
                queue,
                in_progress: HashSet::new(),
                completed: HashSet::new(),
            }),
        }
    }

    /// Claim the next item that is neither completed nor in progress.
    ///
    /// Ineligible items are discarded on the way.
    #[must_use]
    pub fn get_work(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        while let Some(item) = state.queue.pop_front() {
            if state.completed.contains(&item.index) || state.in_progress.contains(&item.index) {
                debug!(index = item.index, "skipping already claimed work item");
                continue;
            }
            state.in_progress.insert(item.index);
            return Some(item);
        }
        None
    }

    /// Mark an item completed. Idempotent.
    pub fn mark_completed(&self, index: usize) {
        let mut state = self.state.lock();
        state.in_progress.remove(&index);
        state.completed.insert(index);
    }

    /// Release an in-progress item without completing it.
    ///
    /// The item is not returned to the queue.
    pub fn mark_failed(&self, index: usize) {
        let mut state = self.state.lock();
        if state.in_progress.remove(&index) {
            debug!(index, "work item failed and was dropped");
        }
    }

    /// Current counts.
    #[must_use]
    pub fn get_progress(&self) -> WorkProgress {
        let state = self.state.lock();
        WorkProgress {
            completed: state.completed.len(),
            in_progress: state.in_progress.len(),
            remaining: state.queue.len(),
        }
    }

    /// Whether the queue is drained and nothing is in progress.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && state.in_progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<WorkItem> {
        (1..=n)
            .map(|i| WorkItem::new(i, format!("+42073123450{i}")))
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let distributor = WorkDistributor::new(items(3));
        let order: Vec<usize> = std::iter::from_fn(|| distributor.get_work())
            .map(|item| item.index)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(distributor.get_work().is_none());
    }

    #[test]
    fn test_duplicate_indices_skipped() {
        let mut work = items(2);
        work.push(WorkItem::new(1, "dup"));
        work.push(WorkItem::new(2, "dup"));
        let distributor = WorkDistributor::new(work);

        let first = distributor.get_work().expect("first item");
        distributor.mark_completed(first.index);
        let second = distributor.get_work().expect("second item");
        assert_eq!(second.index, 2);

        // index 1 is completed and index 2 in progress, so both dups are dropped
        assert!(distributor.get_work().is_none());
        assert_eq!(distributor.get_progress().remaining, 0);
    }

    #[test]
    fn test_mark_completed_idempotent() {
        let distributor = WorkDistributor::new(items(1));
        let item = distributor.get_work().expect("item");

        distributor.mark_completed(item.index);
        distributor.mark_completed(item.index);

        let progress = distributor.get_progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.in_progress, 0);
        assert!(distributor.is_complete());
    }

    #[test]
    fn test_mark_failed_drops_item() {
        let distributor = WorkDistributor::new(items(2));
        let item = distributor.get_work().expect("item");

        distributor.mark_failed(item.index);

        let progress = distributor.get_progress();
        assert_eq!(progress.in_progress, 0);
        assert_eq!(progress.completed, 0);
        assert_eq!(progress.remaining, 1);
        assert_eq!(distributor.get_work().map(|i| i.index), Some(2));
        assert!(distributor.get_work().is_none());
    }

    #[test]
    fn test_progress_and_completion() {
        let distributor = WorkDistributor::new(items(3));
        assert!(!distributor.is_complete());

        let a = distributor.get_work().expect("a");
        let _b = distributor.get_work().expect("b");
        distributor.mark_completed(a.index);

        let progress = distributor.get_progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.remaining, 1);
        assert_eq!(progress.total_processed(), 2);
        assert!(!distributor.is_complete());
    }

    #[test]
    fn test_empty_distributor_is_complete() {
        let distributor = WorkDistributor::new(Vec::new());
        assert!(distributor.is_complete());
        assert!(distributor.get_work().is_none());
    }
}
