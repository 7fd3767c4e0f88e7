//! # Ranking Crate
//!
//! This crate holds the ranked-list engine behind "Top Movies" lists: the
//! rules that assign, shift and repair integer ranks as entries are added,
//! moved and removed.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (RankedList, RankedEntry, EntryPayload)
//! - **list**: Rank-shifting operations on a single list
//! - **store**: The `RankStore` storage port and its in-memory implementation
//! - **snapshot**: JSON snapshot files for the in-memory store
//! - **error**: Error types shared by all of the above
//!
//! ## Example Usage
//!
//! ```ignore
//! use ranking::{EntryDraft, InMemoryStore, RankStore};
//!
//! let store = InMemoryStore::new();
//! let mut list = store.create_list(Some("My Top 100".into())).await?;
//!
//! let payload = EntryDraft {
//!     tmdb_id: Some("597".into()),
//!     title: Some("Titanic".into()),
//!     release_date: Some("1997-11-18".into()),
//!     poster_path: None,
//! }
//! .validate()?;
//!
//! let entry_id = store.allocate_entry_id().await?;
//! list.append(entry_id, payload);
//! let list = store.commit(list).await?;
//! ```
//!
//! ## Invariant
//!
//! After every append, move or remove a list of N entries holds exactly the
//! ranks `1..=N`. `RankStore::commit` refuses ranks outside `[1, MAX_RANK]`
//! and duplicate ranks.

// Public modules
pub mod error;
pub mod types;
pub mod list;
pub mod store;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use error::{FieldErrors, RankError, Result};
pub use list::clamp_target;
pub use store::{InMemoryStore, RankStore, StoreSnapshot};
pub use types::{
    // Type aliases
    EntryId,
    ListId,
    Rank,
    // Core types
    EntryDraft,
    EntryPayload,
    RankedEntry,
    RankedList,
    // Limits
    MAX_RANK,
};
