//! Storage port for ranked lists.
//!
//! `RankStore` is the only thing the service layer knows about persistence.
//! It deals in whole lists: a caller loads a `RankedList`, changes it with the
//! operations in `list.rs`, and hands it back to `commit`. A commit is
//! all-or-nothing, which is what keeps multi-entry shifts atomic.
//!
//! `InMemoryStore` is the bundled implementation. Its state sits behind a
//! `std::sync::RwLock` that is only held for map lookups and swaps, never
//! across an `.await`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FieldErrors, RankError, Result};
use crate::types::{EntryId, ListId, RankedList};

/// Record store for ranked lists.
///
/// ## Design Note
/// - `Send + Sync` so one store can be shared by every request handler
/// - `commit` validates before writing and refuses stale versions with
///   `RankError::ConcurrencyConflict`
#[async_trait]
pub trait RankStore: Send + Sync {
    /// Create an empty list and return it (version 0).
    async fn create_list(&self, title: Option<String>) -> Result<RankedList>;

    /// Load a list with all of its entries.
    async fn get_list(&self, id: ListId) -> Result<RankedList>;

    /// Find the list that owns an entry.
    async fn list_for_entry(&self, entry_id: EntryId) -> Result<ListId>;

    /// Reserve a fresh entry id.
    async fn allocate_entry_id(&self) -> Result<EntryId>;

    /// Persist a changed list.
    ///
    /// `list.version` must equal the stored version; on success the stored
    /// copy (with its version bumped) is returned.
    async fn commit(&self, list: RankedList) -> Result<RankedList>;

    /// Delete a list together with all of its entries.
    async fn delete_list(&self, id: ListId) -> Result<RankedList>;

    /// Ids of every list, ascending.
    async fn list_ids(&self) -> Result<Vec<ListId>>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// Serializable image of an `InMemoryStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub next_list_id: ListId,
    pub next_entry_id: EntryId,
    pub lists: Vec<RankedList>,
}

#[derive(Debug, Default)]
struct StoreState {
    lists: HashMap<ListId, RankedList>,
    /// Which list owns each entry
    entry_index: HashMap<EntryId, ListId>,
    next_list_id: ListId,
    next_entry_id: EntryId,
}

impl StoreState {
    fn reindex(&mut self, old: Option<&RankedList>, new: &RankedList) {
        if let Some(old) = old {
            for entry in old.entries() {
                self.entry_index.remove(&entry.id);
            }
        }
        for entry in new.entries() {
            self.entry_index.insert(entry.id, new.id);
        }
    }
}

/// Thread-safe in-memory `RankStore`.
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                next_list_id: 1,
                next_entry_id: 1,
                ..StoreState::default()
            }),
        }
    }

    /// Rebuild a store from a snapshot, re-validating every list.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut state = StoreState::default();
        let mut max_list_id = 0;
        let mut max_entry_id = 0;

        for mut list in snapshot.lists {
            list.validate()?;
            if state.lists.contains_key(&list.id) {
                return Err(RankError::Validation(FieldErrors::single(
                    "id",
                    format!("List {} appears more than once in the snapshot.", list.id),
                )));
            }
            // Hand-edited files may list entries in any order
            list.sort_entries();
            max_list_id = max_list_id.max(list.id);
            for entry in list.entries() {
                if let Some(owner) = state.entry_index.insert(entry.id, list.id) {
                    return Err(RankError::conflict(
                        list.id,
                        format!("entry {} is also listed under list {}", entry.id, owner),
                    ));
                }
                max_entry_id = max_entry_id.max(entry.id);
            }
            state.lists.insert(list.id, list);
        }

        // Never hand out an id that is already in use, even if the snapshot's
        // counters were edited by hand
        state.next_list_id = snapshot.next_list_id.max(max_list_id + 1);
        state.next_entry_id = snapshot.next_entry_id.max(max_entry_id + 1);

        info!(
            lists = state.lists.len(),
            entries = state.entry_index.len(),
            "Restored store from snapshot"
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Capture the current contents, lists ordered by id.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        let mut lists: Vec<RankedList> = state.lists.values().cloned().collect();
        lists.sort_by_key(|l| l.id);
        StoreSnapshot {
            next_list_id: state.next_list_id,
            next_entry_id: state.next_entry_id,
            lists,
        }
    }

    /// (lists, entries) currently held
    pub fn counts(&self) -> (usize, usize) {
        let state = self.read();
        (state.lists.len(), state.entry_index.len())
    }

    // A poisoned lock only means a panic happened mid-read elsewhere; the
    // state itself is only ever replaced wholesale, so keep serving it
    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RankStore for InMemoryStore {
    async fn create_list(&self, title: Option<String>) -> Result<RankedList> {
        let mut list = RankedList::new(0, None);
        list.rename(title)?;

        let mut state = self.write();
        list.id = state.next_list_id;
        state.next_list_id += 1;
        state.lists.insert(list.id, list.clone());

        info!(list_id = list.id, "Created list");
        Ok(list)
    }

    async fn get_list(&self, id: ListId) -> Result<RankedList> {
        self.read()
            .lists
            .get(&id)
            .cloned()
            .ok_or_else(|| RankError::list_not_found(id))
    }

    async fn list_for_entry(&self, entry_id: EntryId) -> Result<ListId> {
        self.read()
            .entry_index
            .get(&entry_id)
            .copied()
            .ok_or_else(|| RankError::entry_not_found(entry_id))
    }

    async fn allocate_entry_id(&self) -> Result<EntryId> {
        let mut state = self.write();
        let id = state.next_entry_id;
        state.next_entry_id += 1;
        Ok(id)
    }

    async fn commit(&self, mut list: RankedList) -> Result<RankedList> {
        // Rank range and uniqueness are enforced here, not while shifting
        list.validate()?;

        let mut state = self.write();
        let stored_version = state
            .lists
            .get(&list.id)
            .map(|stored| stored.version)
            .ok_or_else(|| RankError::list_not_found(list.id))?;

        if stored_version != list.version {
            warn!(
                list_id = list.id,
                expected = list.version,
                found = stored_version,
                "Rejected stale commit"
            );
            return Err(RankError::conflict(
                list.id,
                format!(
                    "list changed since it was read (version {} != {})",
                    list.version, stored_version
                ),
            ));
        }

        for entry in list.entries() {
            if let Some(&owner) = state.entry_index.get(&entry.id) {
                if owner != list.id {
                    return Err(RankError::conflict(
                        list.id,
                        format!("entry {} belongs to list {}", entry.id, owner),
                    ));
                }
            }
        }

        list.version += 1;
        let old = state.lists.insert(list.id, list.clone());
        state.reindex(old.as_ref(), &list);
        Ok(list)
    }

    async fn delete_list(&self, id: ListId) -> Result<RankedList> {
        let mut state = self.write();
        let list = state
            .lists
            .remove(&id)
            .ok_or_else(|| RankError::list_not_found(id))?;
        for entry in list.entries() {
            state.entry_index.remove(&entry.id);
        }
        info!(list_id = id, entries = list.count(), "Deleted list");
        Ok(list)
    }

    async fn list_ids(&self) -> Result<Vec<ListId>> {
        let mut ids: Vec<ListId> = self.read().lists.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
