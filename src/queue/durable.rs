//! The durable pending-notification queue
//!
//! One serialized actor over an in-memory copy of the persisted state. Every
//! operation takes the queue lock, mutates the in-memory entries, and writes
//! the whole state through the store before releasing the lock, so
//! `take_matching` can never race an `enqueue` into delivering and keeping
//! (or dropping) the same notification.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::protocol::{Filter, Identity};

use super::pending::PendingNotification;
use super::store::{QueueStore, StoreError};

/// Durable queue of notifications awaiting a matching registration
pub struct DurableQueue {
    store: Box<dyn QueueStore>,

    /// In-memory mirror of the persisted state; the store is only ever
    /// written while this lock is held
    entries: Mutex<Vec<PendingNotification>>,

    /// Next id to hand out, seeded past everything loaded at startup
    next_id: AtomicU64,
}

impl DurableQueue {
    /// Open the queue over a store
    ///
    /// An unreadable or corrupt store degrades to an empty queue with a
    /// warning rather than refusing to start; availability is preferred over
    /// completeness here and the dropped entries are gone.
    pub fn open(store: impl QueueStore + 'static) -> Self {
        let entries = match store.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "pending store unreadable, starting with empty queue");
                Vec::new()
            }
        };

        let next_id = entries.iter().map(|n| n.id).max().unwrap_or(0) + 1;

        tracing::info!(pending = entries.len(), "pending queue opened");

        Self {
            store: Box::new(store),
            entries: Mutex::new(entries),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Append a new notification with zero attempts, returning its id
    ///
    /// Persistence failure is returned to the caller and leaves the queue
    /// unchanged; it is never silently swallowed.
    pub async fn enqueue(&self, filter: Filter, message: Value) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entries.push(PendingNotification::new(id, filter, message));

        if let Err(e) = self.store.save(&entries) {
            entries.pop();
            return Err(e);
        }

        tracing::debug!(id = id, pending = entries.len(), "notification queued");
        Ok(id)
    }

    /// Atomically remove and return every entry whose filter matches `identity`
    ///
    /// Snapshot, partition, persist the unmatched remainder, return the
    /// matched entries, all in one critical section. A second call with the same
    /// identity returns nothing unless entries were requeued in between. On
    /// persistence failure the matched entries are restored and the error
    /// propagated; nothing is handed out that is no longer stored.
    pub async fn take_matching(
        &self,
        identity: &Identity,
    ) -> Result<Vec<PendingNotification>, StoreError> {
        let mut entries = self.entries.lock().await;

        if !entries.iter().any(|n| n.filter.matches(identity)) {
            return Ok(Vec::new());
        }

        let (matched, unmatched): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|n| n.filter.matches(identity));
        *entries = unmatched;

        if let Err(e) = self.store.save(&entries) {
            entries.extend(matched);
            return Err(e);
        }

        tracing::debug!(
            identity = %identity,
            taken = matched.len(),
            pending = entries.len(),
            "pending notifications taken"
        );
        Ok(matched)
    }

    /// Put a notification back after a failed delivery attempt
    ///
    /// Increments `attempts` and preserves the original `id` and
    /// `created_at`; otherwise behaves like `enqueue`.
    pub async fn requeue(&self, mut notification: PendingNotification) -> Result<(), StoreError> {
        notification.attempts += 1;

        let mut entries = self.entries.lock().await;
        entries.push(notification);

        if let Err(e) = self.store.save(&entries) {
            entries.pop();
            return Err(e);
        }

        tracing::debug!(pending = entries.len(), "notification requeued");
        Ok(())
    }

    /// Number of pending entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the queue holds no pending entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
