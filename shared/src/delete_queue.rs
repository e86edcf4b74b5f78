//! Optimistic deletion behind a cancelable grace period.
//!
//! Enqueueing removes items from the [`ListStore`] at once and keeps a
//! snapshot so undo is lossless. When a batch's grace timer fires it is
//! committed: the caller sends the backend delete and later resolves the
//! batch with the outcome. Batches are independent of each other and their
//! item sets never overlap.

use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, CoordinatorError};
use crate::list_store::{Keyed, ListStore};
use crate::model::BatchId;
use crate::timer::{TimerId, TimerPurpose, TimerRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    /// Inside the grace period; undo is still possible.
    Pending,
    /// Backend delete sent, waiting for its outcome.
    Committing,
}

#[derive(Debug, Clone)]
pub struct DeleteBatch<T: Keyed> {
    id: BatchId,
    item_ids: BTreeSet<T::Id>,
    snapshot: Vec<T>,
    timer: Option<TimerId>,
    state: BatchState,
}

impl<T: Keyed> DeleteBatch<T> {
    #[must_use]
    pub const fn id(&self) -> BatchId {
        self.id
    }

    #[must_use]
    pub fn item_ids(&self) -> &BTreeSet<T::Id> {
        &self.item_ids
    }

    #[must_use]
    pub fn snapshot(&self) -> &[T] {
        &self.snapshot
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.state
    }

    #[must_use]
    pub fn is_undoable(&self) -> bool {
        self.state == BatchState::Pending
    }

    #[must_use]
    pub const fn timer(&self) -> Option<TimerId> {
        self.timer
    }
}

/// Which backend operation a commit needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget<Id> {
    Single(Id),
    Many(Vec<Id>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteCommand<Id> {
    pub batch_id: BatchId,
    pub target: DeleteTarget<Id>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Confirmed {
        batch_id: BatchId,
        count: usize,
    },
    Failed {
        batch_id: BatchId,
        count: usize,
        restored: usize,
        error: ApiError,
    },
}

#[derive(Debug)]
pub struct DeleteQueue<T: Keyed> {
    grace_period_ms: u64,
    /// Most recent first.
    batches: VecDeque<DeleteBatch<T>>,
}

impl<T: Keyed> DeleteQueue<T> {
    #[must_use]
    pub fn new(grace_period_ms: u64) -> Self {
        Self {
            grace_period_ms,
            batches: VecDeque::new(),
        }
    }

    /// Removes `ids` from `store` and starts their grace period.
    ///
    /// Rejects empty batches, ids already owned by another batch, and ids
    /// that are not in the store. Nothing is mutated on rejection.
    #[instrument(skip_all, fields(grace_period_ms = self.grace_period_ms))]
    pub fn enqueue<I>(
        &mut self,
        ids: I,
        store: &mut ListStore<T>,
        timers: &mut TimerRegistry,
    ) -> Result<BatchId, CoordinatorError>
    where
        I: IntoIterator<Item = T::Id>,
    {
        let item_ids: BTreeSet<T::Id> = ids.into_iter().collect();
        if item_ids.is_empty() {
            return Err(CoordinatorError::EmptyBatch);
        }

        let pending = self.pending_ids();
        let overlapping: Vec<String> = item_ids
            .intersection(&pending)
            .map(ToString::to_string)
            .collect();
        if !overlapping.is_empty() {
            warn!(items = ?overlapping, "rejecting delete of items already pending");
            return Err(CoordinatorError::AlreadyPending(overlapping));
        }

        let unknown: Vec<String> = item_ids
            .iter()
            .filter(|id| !store.contains(id))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            warn!(items = ?unknown, "rejecting delete of unknown items");
            return Err(CoordinatorError::UnknownItems(unknown));
        }

        let snapshot = store.take(&item_ids);
        let id = BatchId::generate();
        let timer = timers.schedule_once(self.grace_period_ms, TimerPurpose::GracePeriod(id));

        info!(batch = %id, count = item_ids.len(), "delete batch pending");
        self.batches.push_front(DeleteBatch {
            id,
            item_ids,
            snapshot,
            timer: Some(timer),
            state: BatchState::Pending,
        });
        Ok(id)
    }

    /// Cancels a pending batch and puts its items back (appended). Returns
    /// how many items were restored, or `None` when the batch is gone or
    /// already committing.
    pub fn undo(
        &mut self,
        batch_id: BatchId,
        store: &mut ListStore<T>,
        timers: &mut TimerRegistry,
    ) -> Option<usize> {
        let Some(index) = self
            .batches
            .iter()
            .position(|b| b.id == batch_id && b.state == BatchState::Pending)
        else {
            debug!(batch = %batch_id, "undo ignored, batch no longer pending");
            return None;
        };

        let batch = self.batches.remove(index)?;
        if let Some(timer) = batch.timer {
            timers.cancel(timer);
        }
        let restored = store.restore(batch.snapshot);
        info!(batch = %batch_id, restored, "delete batch undone");
        Some(restored)
    }

    /// Ends the grace period of a pending batch and returns the backend
    /// delete to issue. The batch stays listed (no longer undoable) until
    /// [`DeleteQueue::resolve`] is called with the outcome.
    pub fn commit(
        &mut self,
        batch_id: BatchId,
        timers: &mut TimerRegistry,
    ) -> Option<DeleteCommand<T::Id>> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id && b.state == BatchState::Pending)?;

        if let Some(timer) = batch.timer.take() {
            timers.cancel(timer);
        }
        batch.state = BatchState::Committing;

        let mut ids: Vec<T::Id> = batch.item_ids.iter().copied().collect();
        let target = if ids.len() == 1 {
            DeleteTarget::Single(ids.remove(0))
        } else {
            DeleteTarget::Many(ids)
        };

        info!(batch = %batch_id, count = batch.item_ids.len(), "delete batch committing");
        Some(DeleteCommand { batch_id, target })
    }

    /// Retires a committing batch whatever the backend said. On failure the
    /// snapshot is put back only when `restore_on_failure` is set.
    pub fn resolve(
        &mut self,
        batch_id: BatchId,
        result: Result<(), ApiError>,
        store: &mut ListStore<T>,
        restore_on_failure: bool,
    ) -> Option<CommitOutcome> {
        let index = self
            .batches
            .iter()
            .position(|b| b.id == batch_id && b.state == BatchState::Committing)?;
        let batch = self.batches.remove(index)?;
        let count = batch.item_ids.len();

        match result {
            Ok(()) => {
                info!(batch = %batch_id, count, "delete confirmed");
                Some(CommitOutcome::Confirmed { batch_id, count })
            }
            Err(error) => {
                let restored = if restore_on_failure {
                    store.restore(batch.snapshot)
                } else {
                    0
                };
                warn!(batch = %batch_id, %error, restored, "delete failed");
                Some(CommitOutcome::Failed {
                    batch_id,
                    count,
                    restored,
                    error,
                })
            }
        }
    }

    /// Every id owned by a batch that has not been resolved yet.
    #[must_use]
    pub fn pending_ids(&self) -> BTreeSet<T::Id> {
        self.batches
            .iter()
            .flat_map(|b| b.item_ids.iter().copied())
            .collect()
    }

    #[must_use]
    pub fn get(&self, batch_id: BatchId) -> Option<&DeleteBatch<T>> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    /// Batches in display order, most recent first.
    pub fn batches(&self) -> impl Iterator<Item = &DeleteBatch<T>> {
        self.batches.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(u32);

    impl Keyed for Item {
        type Id = u32;

        fn key(&self) -> u32 {
            self.0
        }
    }

    fn setup(n: u32) -> (DeleteQueue<Item>, ListStore<Item>, TimerRegistry) {
        let mut store = ListStore::new();
        for i in 1..=n {
            store.upsert(Item(i));
        }
        (DeleteQueue::new(3_000), store, TimerRegistry::new())
    }

    fn sorted_ids(store: &ListStore<Item>) -> Vec<u32> {
        let mut ids = store.ids();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn enqueue_removes_and_schedules() {
        let (mut queue, mut store, mut timers) = setup(3);
        let batch = queue.enqueue([1, 2], &mut store, &mut timers).expect("enqueued");

        assert_eq!(store.ids(), vec![3]);
        assert_eq!(queue.get(batch).map(DeleteBatch::len), Some(2));
        assert_eq!(timers.live_count(), 1);
        assert_eq!(queue.pending_ids(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn undo_restores_exactly_and_cancels_timer() {
        let (mut queue, mut store, mut timers) = setup(3);
        let batch = queue.enqueue([1, 2], &mut store, &mut timers).expect("enqueued");

        assert_eq!(queue.undo(batch, &mut store, &mut timers), Some(2));
        assert_eq!(sorted_ids(&store), vec![1, 2, 3]);
        assert_eq!(timers.live_count(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn undo_twice_is_a_noop() {
        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");

        assert_eq!(queue.undo(batch, &mut store, &mut timers), Some(1));
        assert_eq!(queue.undo(batch, &mut store, &mut timers), None);
        assert_eq!(sorted_ids(&store), vec![1, 2]);
    }

    #[test]
    fn rejects_empty_overlapping_and_unknown() {
        let (mut queue, mut store, mut timers) = setup(3);
        assert_eq!(
            queue.enqueue(Vec::<u32>::new(), &mut store, &mut timers),
            Err(CoordinatorError::EmptyBatch)
        );

        queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        assert_eq!(
            queue.enqueue([1, 2], &mut store, &mut timers),
            Err(CoordinatorError::AlreadyPending(vec!["1".into()]))
        );
        assert_eq!(
            queue.enqueue([2, 9], &mut store, &mut timers),
            Err(CoordinatorError::UnknownItems(vec!["9".into()]))
        );
        assert_eq!(sorted_ids(&store), vec![2, 3]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn newest_batch_is_listed_first() {
        let (mut queue, mut store, mut timers) = setup(3);
        let first = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        let second = queue.enqueue([2], &mut store, &mut timers).expect("enqueued");

        let order: Vec<BatchId> = queue.batches().map(DeleteBatch::id).collect();
        assert_eq!(order, vec![second, first]);
    }

    #[test]
    fn batches_are_independent() {
        let (mut queue, mut store, mut timers) = setup(3);
        let first = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        let second = queue.enqueue([2], &mut store, &mut timers).expect("enqueued");
        let second_timer = queue.get(second).and_then(DeleteBatch::timer);

        queue.undo(first, &mut store, &mut timers);

        let remaining = queue.get(second).expect("still pending");
        assert!(remaining.is_undoable());
        assert_eq!(remaining.timer(), second_timer);
        assert!(second_timer.is_some_and(|t| timers.is_live(t)));
        assert!(!store.contains(&2));
    }

    #[test]
    fn commit_picks_single_or_many() {
        let (mut queue, mut store, mut timers) = setup(4);
        let single = queue.enqueue([4], &mut store, &mut timers).expect("enqueued");
        let many = queue.enqueue([3, 1], &mut store, &mut timers).expect("enqueued");

        assert_eq!(
            queue.commit(single, &mut timers).map(|c| c.target),
            Some(DeleteTarget::Single(4))
        );
        assert_eq!(
            queue.commit(many, &mut timers).map(|c| c.target),
            Some(DeleteTarget::Many(vec![1, 3]))
        );
        assert_eq!(queue.commit(many, &mut timers), None);
        assert_eq!(timers.live_count(), 0);
    }

    #[test]
    fn committing_batch_cannot_be_undone() {
        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        queue.commit(batch, &mut timers);

        assert_eq!(queue.undo(batch, &mut store, &mut timers), None);
        assert!(!store.contains(&1));
        assert_eq!(queue.get(batch).map(DeleteBatch::state), Some(BatchState::Committing));
    }

    #[test]
    fn resolve_success_retires_batch() {
        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        queue.commit(batch, &mut timers);

        let outcome = queue.resolve(batch, Ok(()), &mut store, true);
        assert_eq!(
            outcome,
            Some(CommitOutcome::Confirmed {
                batch_id: batch,
                count: 1
            })
        );
        assert!(queue.is_empty());
        assert!(!store.contains(&1));
        assert_eq!(queue.resolve(batch, Ok(()), &mut store, true), None);
    }

    #[test]
    fn resolve_failure_restores_only_when_asked() {
        let error = ApiError::Status { status: 500 };

        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        queue.commit(batch, &mut timers);
        let outcome = queue.resolve(batch, Err(error.clone()), &mut store, true);
        assert!(matches!(outcome, Some(CommitOutcome::Failed { restored: 1, .. })));
        assert!(store.contains(&1));

        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        queue.commit(batch, &mut timers);
        let outcome = queue.resolve(batch, Err(error), &mut store, false);
        assert!(matches!(outcome, Some(CommitOutcome::Failed { restored: 0, .. })));
        assert!(!store.contains(&1));
        assert!(queue.is_empty());
    }

    #[test]
    fn items_stay_reserved_while_committing() {
        let (mut queue, mut store, mut timers) = setup(2);
        let batch = queue.enqueue([1], &mut store, &mut timers).expect("enqueued");
        queue.commit(batch, &mut timers);
        assert_eq!(queue.pending_ids(), BTreeSet::from([1]));
    }

    proptest! {
        #[test]
        fn undo_is_lossless(ids in proptest::collection::btree_set(1u32..=20, 1..10)) {
            let (mut queue, mut store, mut timers) = setup(20);
            let before = sorted_ids(&store);

            let batch = queue.enqueue(ids.iter().copied(), &mut store, &mut timers).expect("enqueued");
            for id in &ids {
                prop_assert!(!store.contains(id));
            }
            prop_assert_eq!(queue.undo(batch, &mut store, &mut timers), Some(ids.len()));
            prop_assert_eq!(sorted_ids(&store), before);
            prop_assert_eq!(timers.live_count(), 0);
        }
    }
}
