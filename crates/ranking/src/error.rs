//! Error types for the ranking crate.
//!
//! Every failure the engine or a store can produce maps onto one of these
//! variants, so callers (the HTTP layer, the CLI) can pick a status code or
//! an exit message without string matching.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::ListId;

/// Field-level validation messages, keyed by field name.
///
/// Serializes as `{"field": ["message", ...]}` so the HTTP layer can hand it
/// back to clients unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an error set holding a single message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field (empty if the field is fine).
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// `Ok(())` when nothing was recorded, otherwise a `Validation` error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RankError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

/// Errors produced by ranked-list operations and stores.
#[derive(Error, Debug)]
pub enum RankError {
    /// A list or entry id that does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// Missing or malformed fields, or ranks outside the allowed range
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Another writer holds the list or committed first; safe to retry
    #[error("Concurrent update on list {list_id}: {reason}")]
    ConcurrencyConflict { list_id: ListId, reason: String },

    /// I/O error while reading or writing a snapshot file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file contents could not be (de)serialized
    #[error("Snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl RankError {
    pub fn list_not_found(id: ListId) -> Self {
        RankError::NotFound { entity: "List", id }
    }

    pub fn entry_not_found(id: u64) -> Self {
        RankError::NotFound { entity: "Entry", id }
    }

    pub fn conflict(list_id: ListId, reason: impl Into<String>) -> Self {
        RankError::ConcurrencyConflict {
            list_id,
            reason: reason.into(),
        }
    }

    /// True for errors a caller may resolve by simply trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RankError::ConcurrencyConflict { .. })
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RankError>;
