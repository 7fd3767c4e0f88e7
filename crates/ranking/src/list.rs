//! Rank maintenance for a single list.
//!
//! This module holds the operations that keep a list's ranks contiguous:
//! - `append`: new entry lands at `count + 1`
//! - `move_entry`: rotate one entry into a new position, shifting the window
//!   between the old and new rank by one
//! - `remove`: delete an entry and close the gap it leaves
//!
//! All operations work on an owned `RankedList` value. Nothing here touches
//! storage; a caller loads a list, mutates it, and commits the result as a
//! whole, which is what makes a multi-entry shift atomic.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{FieldErrors, RankError, Result};
use crate::types::*;

impl RankedList {
    /// Create an empty list
    pub fn new(id: ListId, title: Option<String>) -> Self {
        Self {
            id,
            title: normalize_title(title),
            version: 0,
            entries: Vec::new(),
        }
    }

    // Getters

    /// Number of entries in the list
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by rank
    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Ranks in list order, handy for assertions and logging
    pub fn ranks(&self) -> Vec<Rank> {
        self.entries.iter().map(|e| e.rank).collect()
    }

    /// True when the ranks are exactly `1..=count`
    pub fn is_contiguous(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.rank as usize == i + 1)
    }

    // Mutators

    /// Set or clear the display title.
    pub fn rename(&mut self, title: Option<String>) -> Result<()> {
        let title = normalize_title(title);
        if let Some(ref t) = title {
            if t.chars().count() > TITLE_MAX_LEN {
                return Err(RankError::Validation(FieldErrors::single(
                    "title",
                    format!(
                        "Ensure this field has no more than {} characters.",
                        TITLE_MAX_LEN
                    ),
                )));
            }
        }
        self.title = title;
        Ok(())
    }

    /// Append a new entry at rank `count + 1`.
    ///
    /// The same `tmdb_id` may be appended more than once; each call yields a
    /// distinct entry. Whether the rank fits under `MAX_RANK` is checked by
    /// `validate` at commit time.
    pub fn append(&mut self, entry_id: EntryId, payload: EntryPayload) -> &RankedEntry {
        let rank = Rank::try_from(self.entries.len())
            .map(|n| n.saturating_add(1))
            .unwrap_or(Rank::MAX);

        debug!(list_id = self.id, entry_id, rank, "Appending entry");
        self.entries
            .push(RankedEntry::from_payload(entry_id, self.id, rank, payload));
        self.sort_entries();

        // Just pushed, so the lookup cannot miss
        let idx = self
            .entries
            .iter()
            .rposition(|e| e.id == entry_id)
            .unwrap_or(self.entries.len() - 1);
        &self.entries[idx]
    }

    /// Move an entry to `target_rank`, shifting the entries in between.
    ///
    /// ## Clamping
    /// - `target_rank == rank`: nothing changes
    /// - `target_rank >= count`: lands on `count`
    /// - `target_rank <= 0`: lands on `1`
    ///
    /// ## Shift
    /// Every other entry with a rank in `[min(current, target), max(current, target)]`
    /// moves one step towards the slot the entry vacated: `+1` when the entry
    /// moves up (to a smaller rank), `-1` when it moves down.
    pub fn move_entry(&mut self, entry_id: EntryId, target_rank: i64) -> Result<&RankedEntry> {
        let current = self.entry_ref(entry_id)?.rank;
        if target_rank == i64::from(current) {
            return self.entry_ref(entry_id);
        }

        let target = clamp_target(target_rank, self.entries.len());
        if target != current {
            let (low, high) = (current.min(target), current.max(target));
            let moving_up = target < current;

            let mut shifted = 0usize;
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| e.id != entry_id && (low..=high).contains(&e.rank))
            {
                entry.rank = if moving_up {
                    entry.rank.saturating_add(1)
                } else {
                    entry.rank.saturating_sub(1)
                };
                shifted += 1;
            }

            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
                entry.rank = target;
            }
            self.sort_entries();

            debug!(
                list_id = self.id,
                entry_id,
                from = current,
                to = target,
                shifted,
                "Moved entry"
            );
        }

        self.entry_ref(entry_id)
    }

    /// Move an entry one position towards rank 1.
    pub fn move_up(&mut self, entry_id: EntryId) -> Result<&RankedEntry> {
        let rank = self.entry_ref(entry_id)?.rank;
        self.move_entry(entry_id, i64::from(rank) - 1)
    }

    /// Move an entry one position towards the end of the list.
    ///
    /// The target still goes through the `>= count` clamp. On a list with a
    /// gap left by `delete`, the last entry's rank exceeds `count`, so moving
    /// it down actually lands it on `count`, above where it was.
    pub fn move_down(&mut self, entry_id: EntryId) -> Result<&RankedEntry> {
        let rank = self.entry_ref(entry_id)?.rank;
        self.move_entry(entry_id, i64::from(rank) + 1)
    }

    /// Delete an entry and pull every entry ranked below it up by one.
    pub fn remove(&mut self, entry_id: EntryId) -> Result<RankedEntry> {
        let idx = self.position(entry_id)?;
        let removed_rank = self.entries[idx].rank;

        let mut shifted = 0usize;
        for entry in self.entries.iter_mut().filter(|e| e.rank > removed_rank) {
            entry.rank -= 1;
            shifted += 1;
        }
        let removed = self.entries.remove(idx);

        debug!(
            list_id = self.id,
            entry_id,
            rank = removed_rank,
            shifted,
            "Removed entry"
        );
        Ok(removed)
    }

    /// Delete an entry without touching anyone else's rank.
    ///
    /// Leaves a gap unless the entry was last; `compact` repairs it.
    pub fn delete(&mut self, entry_id: EntryId) -> Result<RankedEntry> {
        let idx = self.position(entry_id)?;
        let removed = self.entries.remove(idx);
        debug!(list_id = self.id, entry_id, rank = removed.rank, "Deleted entry without renumbering");
        Ok(removed)
    }

    /// Renumber the list to `1..=count`, keeping the current order.
    ///
    /// Ties on rank keep the older (lower id) entry first. Returns how many
    /// entries changed rank.
    pub fn compact(&mut self) -> usize {
        self.sort_entries();
        let mut changed = 0;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            let rank = Rank::try_from(i + 1).unwrap_or(Rank::MAX);
            if entry.rank != rank {
                entry.rank = rank;
                changed += 1;
            }
        }
        if changed > 0 {
            debug!(list_id = self.id, changed, "Compacted ranks");
        }
        changed
    }

    /// Check everything a store must refuse to persist.
    ///
    /// - every rank within `[1, MAX_RANK]`
    /// - no two entries sharing a rank
    /// - every entry pointing back at this list
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        let mut seen = HashSet::new();

        for entry in &self.entries {
            if entry.rank < 1 {
                errors.add("rank", "Ensure this value is greater than or equal to 1.");
            } else if entry.rank > MAX_RANK {
                errors.add(
                    "rank",
                    format!("Ensure this value is less than or equal to {}.", MAX_RANK),
                );
            }
            if !seen.insert(entry.rank) {
                errors.add(
                    "rank",
                    format!("An entry with rank {} already exists in this list.", entry.rank),
                );
            }
            if entry.list_id != self.id {
                errors.add(
                    "top_movies",
                    format!("Entry {} belongs to list {}.", entry.id, entry.list_id),
                );
            }
        }

        errors.into_result()
    }

    fn position(&self, entry_id: EntryId) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| RankError::entry_not_found(entry_id))
    }

    fn entry_ref(&self, entry_id: EntryId) -> Result<&RankedEntry> {
        self.entry(entry_id)
            .ok_or_else(|| RankError::entry_not_found(entry_id))
    }

    pub(crate) fn sort_entries(&mut self) {
        self.entries.sort_by_key(|e| (e.rank, e.id));
    }
}

/// Clamp a requested rank into `[1, count]`.
///
/// The upper check is `>= count`, so asking for exactly `count` also yields
/// `count`.
pub fn clamp_target(target_rank: i64, count: usize) -> Rank {
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    let clamped = if target_rank >= count {
        count
    } else if target_rank <= 0 {
        1
    } else {
        target_rank
    };
    Rank::try_from(clamped.max(1)).unwrap_or(Rank::MAX)
}

fn normalize_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn payload(title: &str) -> EntryPayload {
        EntryPayload {
            tmdb_id: format!("tmdb-{}", title),
            title: title.to_string(),
            release_date: NaiveDate::from_ymd_opt(2012, 4, 25).unwrap(),
            poster_path: String::new(),
        }
    }

    /// A..E at ranks 1..5 with entry ids 1..5
    fn five_movies() -> RankedList {
        let mut list = RankedList::new(1, Some("Top Movies".to_string()));
        for (i, title) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            list.append(i as EntryId + 1, payload(title));
        }
        list
    }

    fn titles(list: &RankedList) -> Vec<&str> {
        list.entries().iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_append_assigns_next_rank() {
        let mut list = RankedList::new(7, None);
        assert_eq!(list.append(10, payload("A")).rank, 1);
        assert_eq!(list.append(11, payload("B")).rank, 2);
        let entry = list.append(12, payload("C"));
        assert_eq!(entry.rank, 3);
        assert_eq!(entry.list_id, 7);
        assert!(list.is_contiguous());
    }

    #[test]
    fn test_append_duplicate_tmdb_id_creates_two_entries() {
        let mut list = RankedList::new(1, None);
        list.append(1, payload("Titanic"));
        list.append(2, payload("Titanic"));

        assert_eq!(list.count(), 2);
        let entries = list.entries();
        assert_eq!(entries[0].tmdb_id, entries[1].tmdb_id);
        assert_ne!(entries[0].id, entries[1].id);
        assert_eq!(list.ranks(), vec![1, 2]);
    }

    #[test]
    fn test_move_up_to_first() {
        let mut list = five_movies();
        let moved = list.move_entry(3, 1).unwrap();
        assert_eq!(moved.rank, 1);
        assert_eq!(titles(&list), vec!["C", "A", "B", "D", "E"]);
        assert!(list.is_contiguous());
    }

    #[test]
    fn test_move_down_to_fourth() {
        let mut list = five_movies();
        list.move_entry(3, 4).unwrap();
        assert_eq!(titles(&list), vec!["A", "B", "D", "C", "E"]);
        assert!(list.is_contiguous());
    }

    #[test]
    fn test_move_to_own_rank_is_noop() {
        let mut list = five_movies();
        let before = list.clone();
        list.move_entry(2, 2).unwrap();
        assert_eq!(list, before);
    }

    #[test]
    fn test_move_clamps_low_and_high() {
        let mut list = five_movies();
        assert_eq!(list.move_entry(4, 0).unwrap().rank, 1);
        assert_eq!(list.move_entry(4, -12).unwrap().rank, 1);
        assert_eq!(list.move_entry(2, 55).unwrap().rank, 5);
        assert!(list.is_contiguous());
    }

    #[test]
    fn test_move_last_entry_down_stays_last() {
        let mut list = five_movies();
        let before = list.clone();
        assert_eq!(list.move_down(5).unwrap().rank, 5);
        assert_eq!(list, before);
    }

    #[test]
    fn test_move_first_entry_up_stays_first() {
        let mut list = five_movies();
        let before = list.clone();
        assert_eq!(list.move_up(1).unwrap().rank, 1);
        assert_eq!(list, before);
    }

    #[test]
    fn test_move_up_and_down_swap_neighbours() {
        let mut list = five_movies();
        list.move_up(4).unwrap();
        assert_eq!(titles(&list), vec!["A", "B", "D", "C", "E"]);
        list.move_down(1).unwrap();
        assert_eq!(titles(&list), vec!["B", "A", "D", "C", "E"]);
    }

    #[test]
    fn test_move_unknown_entry() {
        let mut list = five_movies();
        let err = list.move_entry(99, 1).unwrap_err();
        assert!(matches!(err, RankError::NotFound { entity: "Entry", id: 99 }));
    }

    #[test]
    fn test_remove_renumbers_tail_only() {
        let mut list = five_movies();
        let removed = list.remove(2).unwrap();
        assert_eq!(removed.title, "B");
        assert_eq!(titles(&list), vec!["A", "C", "D", "E"]);
        assert_eq!(list.ranks(), vec![1, 2, 3, 4]);
        assert_eq!(list.entry(1).unwrap().rank, 1);
        assert_eq!(list.count(), 4);
    }

    #[test]
    fn test_remove_last_entry() {
        let mut list = five_movies();
        list.remove(5).unwrap();
        assert_eq!(list.ranks(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_delete_leaves_gap_and_compact_repairs_it() {
        let mut list = five_movies();
        list.delete(2).unwrap();
        assert_eq!(list.ranks(), vec![1, 3, 4, 5]);
        assert!(!list.is_contiguous());

        assert_eq!(list.compact(), 3);
        assert_eq!(titles(&list), vec!["A", "C", "D", "E"]);
        assert!(list.is_contiguous());
        assert_eq!(list.compact(), 0);
    }

    #[test]
    fn test_move_down_last_entry_after_gap_clamps_to_count() {
        let mut list = five_movies();
        list.delete(2).unwrap();
        assert_eq!(list.ranks(), vec![1, 3, 4, 5]);

        assert_eq!(list.move_down(5).unwrap().rank, 4);
        assert_eq!(titles(&list), vec!["A", "C", "E", "D"]);
        assert_eq!(list.ranks(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_validate_rejects_rank_over_limit() {
        let mut list = RankedList::new(1, None);
        for id in 1..=(MAX_RANK as EntryId + 1) {
            list.append(id, payload("X"));
        }
        let err = list.validate().unwrap_err();
        match err {
            RankError::Validation(errors) => assert_eq!(errors.get("rank").len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_rank() {
        let mut list = five_movies();
        list.delete(5).unwrap();
        list.delete(2).unwrap();
        // Ranks are now 1,3,4; appending uses count + 1 = 4
        list.append(6, payload("F"));
        assert!(list.validate().is_err());
        list.compact();
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_rename() {
        let mut list = RankedList::new(1, None);
        list.rename(Some("  My Top 100 ".to_string())).unwrap();
        assert_eq!(list.title.as_deref(), Some("My Top 100"));
        list.rename(Some("   ".to_string())).unwrap();
        assert_eq!(list.title, None);
        assert!(list.rename(Some("x".repeat(256))).is_err());
    }

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(0, 5), 1);
        assert_eq!(clamp_target(-3, 5), 1);
        assert_eq!(clamp_target(3, 5), 3);
        assert_eq!(clamp_target(5, 5), 5);
        assert_eq!(clamp_target(55, 5), 5);
        assert_eq!(clamp_target(i64::MAX, 1), 1);
    }
}
