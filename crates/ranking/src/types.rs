//! Core domain types for ranked movie lists.
//!
//! This module defines the data structures shared by the engine, the stores
//! and the HTTP layer:
//! - Type aliases for identifiers (ListId, EntryId, Rank)
//! - The raw request shape (`EntryDraft`) and its validated form (`EntryPayload`)
//! - `RankedEntry` and `RankedList` themselves
//!
//! The rank-shifting logic lives in `list.rs`; this file only holds data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FieldErrors, RankError, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a ranked list
pub type ListId = u64;

/// Unique identifier for an entry, unique across all lists
pub type EntryId = u64;

/// 1-based position of an entry within its list
pub type Rank = u32;

/// Highest rank a list may hold ("Top 100")
pub const MAX_RANK: Rank = 100;

/// Field length limits carried over from the persisted record layout
pub const TMDB_ID_MAX_LEN: usize = 50;
pub const TITLE_MAX_LEN: usize = 255;
pub const POSTER_PATH_MAX_LEN: usize = 255;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Entry payloads
// =============================================================================

/// Unvalidated entry fields as they arrive from a caller.
///
/// Every field is optional so that a missing field is reported as a
/// validation message instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryDraft {
    pub tmdb_id: Option<String>,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
}

/// Movie metadata that passed validation and can be appended to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub tmdb_id: String,
    pub title: String,
    pub release_date: NaiveDate,
    #[serde(default)]
    pub poster_path: String,
}

impl EntryDraft {
    /// Check every field and collect all problems at once.
    ///
    /// Returns `RankError::Validation` listing each offending field.
    pub fn validate(self) -> Result<EntryPayload> {
        let mut errors = FieldErrors::new();

        let tmdb_id = required_text(&mut errors, "tmdb_id", self.tmdb_id, TMDB_ID_MAX_LEN);
        let title = required_text(&mut errors, "title", self.title, TITLE_MAX_LEN);

        let release_date = match self.release_date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("release_date", REQUIRED);
                None
            }
            Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(
                        "release_date",
                        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                    );
                    None
                }
            },
        };

        let poster_path = self.poster_path.unwrap_or_default().trim().to_string();
        check_poster_path(&mut errors, &poster_path);

        // A None field always left a message behind in `errors`
        match (tmdb_id, title, release_date) {
            (Some(tmdb_id), Some(title), Some(release_date)) if errors.is_empty() => {
                Ok(EntryPayload {
                    tmdb_id,
                    title,
                    release_date,
                    poster_path,
                })
            }
            _ => Err(RankError::Validation(errors)),
        }
    }
}

fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_len),
        );
        return None;
    }
    Some(value)
}

fn check_poster_path(errors: &mut FieldErrors, poster_path: &str) {
    // Blank is allowed: not every movie has a poster
    if poster_path.is_empty() {
        return;
    }
    if poster_path.chars().count() > POSTER_PATH_MAX_LEN {
        errors.add(
            "poster_path",
            format!(
                "Ensure this field has no more than {} characters.",
                POSTER_PATH_MAX_LEN
            ),
        );
        return;
    }
    match url::Url::parse(poster_path) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.add("poster_path", "Enter a valid URL."),
    }
}

// =============================================================================
// Ranked entries and lists
// =============================================================================

/// One movie inside a ranked list.
///
/// Serialized with the persisted field names:
/// `{id, tmdb_id, title, release_date, poster_path, top_movies, rank}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: EntryId,
    pub tmdb_id: String,
    pub title: String,
    pub release_date: NaiveDate,
    pub poster_path: String,
    /// Owning list (non-owning back-reference)
    #[serde(rename = "top_movies")]
    pub list_id: ListId,
    pub rank: Rank,
}

impl RankedEntry {
    pub(crate) fn from_payload(id: EntryId, list_id: ListId, rank: Rank, payload: EntryPayload) -> Self {
        Self {
            id,
            tmdb_id: payload.tmdb_id,
            title: payload.title,
            release_date: payload.release_date,
            poster_path: payload.poster_path,
            list_id,
            rank,
        }
    }
}

/// A named collection of ranked entries.
///
/// Entries are kept sorted by `(rank, id)`. The list owns its entries:
/// dropping the list drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedList {
    pub id: ListId,
    pub title: Option<String>,
    /// Commit counter, bumped by the store on every successful commit
    #[serde(default)]
    pub version: u64,
    pub(crate) entries: Vec<RankedEntry>,
}
