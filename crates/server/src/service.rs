//! # Top Movies Service
//!
//! This module coordinates every ranked-list operation:
//! 1. Resolve the list an entry belongs to
//! 2. Take that list's exclusive lock (bounded wait)
//! 3. Load the list from the store
//! 4. Apply the rank operation
//! 5. Commit the whole list in one step
//!
//! Holding the lock from load to commit means two writers never interleave
//! shifts on the same list. Lists never share a lock, so work on one list
//! does not wait for another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use ranking::{
    EntryDraft, EntryId, ListId, RankError, RankStore, RankedEntry, RankedList, Result,
};

/// Per-list exclusive locks.
///
/// The outer std mutex only guards the map and is never held across an
/// `.await`; the per-list tokio mutexes are what callers wait on.
#[derive(Clone, Default)]
struct ListLocks {
    locks: Arc<Mutex<HashMap<ListId, Arc<AsyncMutex<()>>>>>,
}

impl ListLocks {
    fn handle(&self, list_id: ListId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(list_id).or_default().clone()
    }

    fn forget(&self, list_id: ListId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&list_id);
    }

    /// Drop our handle and remove the map entry if nobody else holds it.
    ///
    /// Used when the list turned out not to exist, so probing unknown ids
    /// never leaves locks behind.
    fn release_idle(&self, list_id: ListId, handle: Arc<AsyncMutex<()>>) {
        drop(handle);
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&list_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&list_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Entry point for all list operations, shared by the HTTP layer and the CLI.
#[derive(Clone)]
pub struct TopMoviesService {
    store: Arc<dyn RankStore>,
    locks: ListLocks,
    lock_timeout: Duration,
}

impl TopMoviesService {
    /// Create a service on top of a store
    ///
    /// # Arguments
    /// * `store` - Any `RankStore` implementation
    /// * `lock_timeout` - How long a writer waits for a busy list before
    ///   giving up with `ConcurrencyConflict`
    pub fn new(store: Arc<dyn RankStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: ListLocks::default(),
            lock_timeout,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_list(&self, list_id: ListId) -> Result<RankedList> {
        self.store.get_list(list_id).await
    }

    pub async fn get_entry(&self, entry_id: EntryId) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let list = self.store.get_list(list_id).await?;
        list.entry(entry_id)
            .cloned()
            .ok_or_else(|| RankError::entry_not_found(entry_id))
    }

    pub async fn list_ids(&self) -> Result<Vec<ListId>> {
        self.store.list_ids().await
    }

    // =========================================================================
    // List lifecycle
    // =========================================================================

    /// Create a list and append its first entry.
    ///
    /// The draft is validated before anything is created, so a bad payload
    /// never leaves an empty list behind.
    pub async fn create_list(
        &self,
        draft: EntryDraft,
        title: Option<String>,
    ) -> Result<(RankedList, RankedEntry)> {
        let payload = draft.validate()?;
        let list = self.store.create_list(title).await?;
        let entry_id = self.store.allocate_entry_id().await?;

        let result = self
            .with_list(list.id, "create", move |list| {
                Ok(list.append(entry_id, payload).clone())
            })
            .await;

        match result {
            Ok((entry, list)) => {
                info!(list_id = list.id, entry_id = entry.id, "Created list with first entry");
                Ok((list, entry))
            }
            Err(err) => {
                warn!(list_id = list.id, error = %err, "First append failed, dropping new list");
                if let Err(cleanup) = self.store.delete_list(list.id).await {
                    warn!(list_id = list.id, error = %cleanup, "Could not drop half-created list");
                }
                Err(err)
            }
        }
    }

    /// Set or clear a list's title
    pub async fn rename_list(&self, list_id: ListId, title: Option<String>) -> Result<RankedList> {
        let ((), list) = self
            .with_list(list_id, "rename", |list| list.rename(title))
            .await?;
        Ok(list)
    }

    /// Delete a list and every entry in it
    pub async fn delete_list(&self, list_id: ListId) -> Result<()> {
        let lock = self.locks.handle(list_id);
        let guard = self.acquire(list_id, &lock).await?;
        let deleted = match self.store.delete_list(list_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                drop(guard);
                self.locks.release_idle(list_id, lock);
                return Err(err);
            }
        };
        self.locks.forget(list_id);
        info!(list_id, entries = deleted.count(), "Deleted list and its entries");
        Ok(())
    }

    /// Renumber a list to 1..=N in its current order
    pub async fn compact_list(&self, list_id: ListId) -> Result<RankedList> {
        let (changed, list) = self
            .with_list(list_id, "compact", |list| Ok(list.compact()))
            .await?;
        info!(list_id, changed, "Compacted list");
        Ok(list)
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    /// Append an entry at rank `count + 1`
    pub async fn append(&self, list_id: ListId, draft: EntryDraft) -> Result<RankedEntry> {
        let payload = draft.validate()?;
        // Make sure the list exists before burning an id
        self.store.get_list(list_id).await?;
        let entry_id = self.store.allocate_entry_id().await?;

        let (entry, _) = self
            .with_list(list_id, "append", move |list| {
                Ok(list.append(entry_id, payload).clone())
            })
            .await?;
        info!(list_id, entry_id = entry.id, rank = entry.rank, "Appended entry");
        Ok(entry)
    }

    /// Move an entry to `target_rank` (clamped into the list)
    pub async fn move_entry(&self, entry_id: EntryId, target_rank: i64) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let (entry, _) = self
            .with_list(list_id, "move", move |list| {
                list.move_entry(entry_id, target_rank).cloned()
            })
            .await?;
        info!(list_id, entry_id, requested = target_rank, rank = entry.rank, "Moved entry");
        Ok(entry)
    }

    /// Move an entry one place towards rank 1
    pub async fn move_up(&self, entry_id: EntryId) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let (entry, _) = self
            .with_list(list_id, "move-up", move |list| list.move_up(entry_id).cloned())
            .await?;
        info!(list_id, entry_id, rank = entry.rank, "Moved entry up");
        Ok(entry)
    }

    /// Move an entry one place towards the end
    pub async fn move_down(&self, entry_id: EntryId) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let (entry, _) = self
            .with_list(list_id, "move-down", move |list| list.move_down(entry_id).cloned())
            .await?;
        info!(list_id, entry_id, rank = entry.rank, "Moved entry down");
        Ok(entry)
    }

    /// Remove an entry and renumber the entries after it
    pub async fn remove(&self, entry_id: EntryId) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let (removed, list) = self
            .with_list(list_id, "remove", move |list| list.remove(entry_id))
            .await?;
        info!(list_id, entry_id, rank = removed.rank, remaining = list.count(), "Removed entry");
        Ok(removed)
    }

    /// Delete an entry without renumbering the rest
    pub async fn delete_entry(&self, entry_id: EntryId) -> Result<RankedEntry> {
        let list_id = self.store.list_for_entry(entry_id).await?;
        let (removed, _) = self
            .with_list(list_id, "delete", move |list| list.delete(entry_id))
            .await?;
        info!(list_id, entry_id, rank = removed.rank, "Deleted entry without renumbering");
        Ok(removed)
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Run `op` on a freshly loaded copy of the list while holding its lock,
    /// then commit the result.
    ///
    /// Returns the operation's output together with the committed list.
    /// If `op` or the commit fails, nothing is written.
    async fn with_list<T, F>(&self, list_id: ListId, op_name: &'static str, op: F) -> Result<(T, RankedList)>
    where
        F: FnOnce(&mut RankedList) -> Result<T>,
    {
        let start = Instant::now();
        let lock = self.locks.handle(list_id);
        let guard = self.acquire(list_id, &lock).await?;

        let mut list = match self.store.get_list(list_id).await {
            Ok(list) => list,
            Err(err) => {
                drop(guard);
                self.locks.release_idle(list_id, lock);
                return Err(err);
            }
        };
        let output = op(&mut list)?;
        let committed = self.store.commit(list).await?;

        debug!(
            list_id,
            op = op_name,
            version = committed.version,
            "Committed in {:.2?}",
            start.elapsed()
        );
        Ok((output, committed))
    }

    async fn acquire<'a>(
        &self,
        list_id: ListId,
        lock: &'a Arc<AsyncMutex<()>>,
    ) -> Result<tokio::sync::MutexGuard<'a, ()>> {
        match tokio::time::timeout(self.lock_timeout, lock.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(list_id, timeout = ?self.lock_timeout, "Timed out waiting for list lock");
                Err(RankError::conflict(
                    list_id,
                    format!("list is busy, gave up after {:?}", self.lock_timeout),
                ))
            }
        }
    }
}
