//! Snapshot files for the in-memory store.
//!
//! A snapshot is the whole store serialized as pretty-printed JSON. Loading a
//! missing file yields an empty store, so a fresh install needs no setup.
//! Saving writes to a sibling temp file first and renames it into place, so a
//! crash mid-write never leaves a truncated snapshot behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::store::{InMemoryStore, StoreSnapshot};

impl InMemoryStore {
    /// Load a store from `path`, or start empty if the file does not exist
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found, starting with an empty store");
            return Ok(Self::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
        debug!(path = %path.display(), lists = snapshot.lists.len(), "Read snapshot");
        Self::from_snapshot(snapshot)
    }

    /// Write the current contents to `path`, replacing any previous file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), lists = snapshot.lists.len(), "Saved snapshot");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RankStore;
    use crate::types::EntryPayload;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("top-movies.json");

        let store = InMemoryStore::new();
        let mut list = store.create_list(Some("Mine".to_string())).await.unwrap();
        let entry_id = store.allocate_entry_id().await.unwrap();
        list.append(
            entry_id,
            EntryPayload {
                tmdb_id: "597".to_string(),
                title: "Titanic".to_string(),
                release_date: NaiveDate::from_ymd_opt(1997, 11, 18).unwrap(),
                poster_path: "https://image.tmdb.org/t/p/w500/titanic.jpg".to_string(),
            },
        );
        store.commit(list).await.unwrap();
        store.save_to_file(&path).unwrap();

        let restored = InMemoryStore::load_from_file(&path).unwrap();
        assert_eq!(restored.snapshot(), store.snapshot());
        assert_eq!(restored.list_for_entry(entry_id).await.unwrap(), 1);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_missing_file_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::load_from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(store.counts(), (0, 0));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            InMemoryStore::load_from_file(&path),
            Err(crate::RankError::Snapshot(_))
        ));
    }
}
