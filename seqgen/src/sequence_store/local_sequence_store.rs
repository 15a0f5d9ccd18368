/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! In-process sequence store with optional persistence to a JSON file.

use super::SequenceStore;
use crate::SeqgenError;
use crate::SeqgenErrorKind;
use crate::SequenceConfig;
use crate::SequenceIdentity;
use async_trait::async_trait;
use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::map::Entry;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Persisted form of a sequence row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRow {
    schema_name: String,
    sequence_name: String,
    increment: i64,
    min_value: i64,
    max_value: i64,
    cycle: bool,
    restart_value: i64,
    /// `None` when the sequence is exhausted.
    current_value: Option<i64>,
}

impl StoredRow {
    fn new(
        identity: &SequenceIdentity,
        config: &SequenceConfig,
        current_value: Option<i64>,
    ) -> Self {
        Self {
            schema_name: identity.schema_name().to_string(),
            sequence_name: identity.sequence_name().to_string(),
            increment: config.increment(),
            min_value: config.min_value(),
            max_value: config.max_value(),
            cycle: config.can_cycle(),
            restart_value: config.restart_value(),
            current_value,
        }
    }

    fn identity(&self) -> SequenceIdentity {
        SequenceIdentity::new(&self.schema_name, &self.sequence_name)
    }

    fn config(&self) -> Result<SequenceConfig, SeqgenError> {
        SequenceConfig::new(
            self.increment,
            self.min_value,
            self.max_value,
            self.cycle,
            self.restart_value,
        )
    }
}

/// Live row. The mutex doubles as the row lock.
struct SequenceRow {
    config: SequenceConfig,
    upper_bound: Mutex<Option<i64>>,
}

/** Sequence rows kept in memory and optionally written to a JSON file.

Row locks are held for the duration of a compare-and-swap including the
file write. The file is replaced atomically (write to a temporary file and
rename) so a crash leaves either the old or the new document.
*/
pub struct LocalSequenceStore {
    rows: SkipMap<SequenceIdentity, Arc<SequenceRow>>,
    /// Everything that is written to file. Locked after any row lock.
    document: Mutex<BTreeMap<SequenceIdentity, StoredRow>>,
    persistence_path: Option<PathBuf>,
    lock_timeout_millis: u64,
}

impl LocalSequenceStore {
    /// Return a new instance that forgets everything on restart.
    pub fn in_memory(lock_timeout_millis: u64) -> Arc<Self> {
        Arc::new(Self {
            rows: SkipMap::default(),
            document: Mutex::default(),
            persistence_path: None,
            lock_timeout_millis,
        })
    }

    /// Return a new instance backed by the file at `path`.
    ///
    /// Rows are recovered from the file if it exists.
    pub async fn with_persistence(
        path: impl AsRef<Path>,
        lock_timeout_millis: u64,
    ) -> Result<Arc<Self>, SeqgenError> {
        let path = path.as_ref().to_path_buf();
        let stored_rows = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str::<Vec<StoredRow>>(&contents).map_err(|e| {
                SeqgenErrorKind::Malformed
                    .error_with_msg(format!("Unable to parse '{}': {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No sequences stored at '{}' yet.", path.display());
                Vec::default()
            }
            Err(e) => Err(SeqgenErrorKind::Storage
                .error_with_msg(format!("Unable to read '{}': {e}", path.display())))?,
        };
        let rows = SkipMap::default();
        let mut document = BTreeMap::new();
        for stored_row in stored_rows {
            let identity = stored_row.identity();
            let config = stored_row.config().map_err(|e| {
                SeqgenErrorKind::Malformed
                    .error_with_msg(format!("Stored configuration of {identity} is invalid: {e}"))
            })?;
            rows.insert(
                identity.clone(),
                Arc::new(SequenceRow {
                    config,
                    upper_bound: Mutex::new(stored_row.current_value),
                }),
            );
            document.insert(identity, stored_row);
        }
        log::info!("Loaded {} sequence(s) from '{}'.", rows.len(), path.display());
        Ok(Arc::new(Self {
            rows,
            document: Mutex::new(document),
            persistence_path: Some(path),
            lock_timeout_millis,
        }))
    }

    fn row(&self, identity: &SequenceIdentity) -> Result<Arc<SequenceRow>, SeqgenError> {
        self.rows
            .get(identity)
            .as_ref()
            .map(Entry::value)
            .map(Arc::clone)
            .ok_or_else(|| {
                SeqgenErrorKind::NotFound.error_with_msg(format!("No sequence {identity}."))
            })
    }

    /// Write the document to file (if any).
    ///
    /// Returns only after the new document and its directory entry have been
    /// flushed to the storage device.
    async fn persist(
        &self,
        document: &BTreeMap<SequenceIdentity, StoredRow>,
    ) -> Result<(), SeqgenError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let stored_rows = document.values().collect::<Vec<_>>();
        let contents = serde_json::to_vec_pretty(&stored_rows).map_err(|e| {
            SeqgenErrorKind::Malformed.error_with_msg(format!("Unable to serialize rows: {e}"))
        })?;
        let tmp_path = path.with_extension("tmp");
        Self::write_synced(&tmp_path, &contents)
            .await
            .map_err(|e| {
                SeqgenErrorKind::Storage
                    .error_with_msg(format!("Unable to write '{}': {e}", tmp_path.display()))
            })?;
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            SeqgenErrorKind::Storage
                .error_with_msg(format!("Unable to replace '{}': {e}", path.display()))
        })?;
        Self::sync_parent_dir(path).await;
        Ok(())
    }

    async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }

    /// Make the rename durable. Not every platform can open directories, so
    /// failures are only logged.
    async fn sync_parent_dir(path: &Path) {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let synced = match tokio::fs::File::open(parent).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            log::debug!("Unable to sync directory '{}': {e}", parent.display());
        }
    }
}

#[async_trait]
impl SequenceStore for LocalSequenceStore {
    async fn load_config(
        &self,
        identity: &SequenceIdentity,
    ) -> Result<SequenceConfig, SeqgenError> {
        self.row(identity).map(|row| row.config)
    }

    async fn read_current_upper_bound(
        &self,
        identity: &SequenceIdentity,
    ) -> Result<Option<i64>, SeqgenError> {
        let row = self.row(identity)?;
        let upper_bound = *row.upper_bound.lock().await;
        Ok(upper_bound)
    }

    async fn compare_and_swap_upper_bound(
        &self,
        identity: &SequenceIdentity,
        observed_old: Option<i64>,
        proposed_new: Option<i64>,
        wait_for_lock: bool,
    ) -> Result<bool, SeqgenError> {
        let row = self.row(identity)?;
        let mut upper_bound = if wait_for_lock {
            row.upper_bound.lock().await
        } else if let Ok(upper_bound) = row.upper_bound.try_lock() {
            upper_bound
        } else {
            log::debug!("Row of {identity} is locked by another writer.");
            return Ok(false);
        };
        if *upper_bound != observed_old {
            return Ok(false);
        }
        let mut document = self.document.lock().await;
        let stored_row = document.get_mut(identity).ok_or_else(|| {
            SeqgenErrorKind::NotFound.error_with_msg(format!("Sequence {identity} was dropped."))
        })?;
        stored_row.current_value = proposed_new;
        if let Err(e) = self.persist(&document).await {
            if let Some(stored_row) = document.get_mut(identity) {
                stored_row.current_value = observed_old;
            }
            return Err(e);
        }
        *upper_bound = proposed_new;
        Ok(true)
    }

    fn lock_timeout_millis(&self) -> u64 {
        self.lock_timeout_millis
    }

    async fn create_sequence(
        &self,
        identity: &SequenceIdentity,
        config: SequenceConfig,
        start_value: i64,
    ) -> Result<(), SeqgenError> {
        if !config.contains(start_value) {
            Err(SeqgenErrorKind::Malformed.error_with_msg(format!(
                "Start value {start_value} is outside of the domain of {identity}."
            )))?;
        }
        let mut document = self.document.lock().await;
        if document.contains_key(identity) {
            Err(SeqgenErrorKind::Malformed
                .error_with_msg(format!("Sequence {identity} already exists.")))?;
        }
        document.insert(
            identity.clone(),
            StoredRow::new(identity, &config, Some(start_value)),
        );
        if let Err(e) = self.persist(&document).await {
            document.remove(identity);
            return Err(e);
        }
        self.rows.insert(
            identity.clone(),
            Arc::new(SequenceRow {
                config,
                upper_bound: Mutex::new(Some(start_value)),
            }),
        );
        log::debug!("Created sequence {identity} starting at {start_value}.");
        Ok(())
    }

    async fn drop_sequence(&self, identity: &SequenceIdentity) -> Result<(), SeqgenError> {
        let mut document = self.document.lock().await;
        let stored_row = document.remove(identity).ok_or_else(|| {
            SeqgenErrorKind::NotFound.error_with_msg(format!("No sequence {identity}."))
        })?;
        if let Err(e) = self.persist(&document).await {
            document.insert(identity.clone(), stored_row);
            return Err(e);
        }
        self.rows.remove(identity);
        log::debug!("Dropped sequence {identity}.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer_config() -> SequenceConfig {
        SequenceConfig::new(
            1,
            i64::from(i32::MIN),
            i64::from(i32::MAX),
            false,
            i64::from(i32::MIN),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn compare_and_swap_only_replaces_the_observed_value() {
        let store = LocalSequenceStore::in_memory(100);
        let id = SequenceIdentity::new("APP", "S");
        store.create_sequence(&id, integer_config(), 5).await.unwrap();
        assert!(!store.compare_and_swap_upper_bound(&id, Some(4), Some(25), false).await.unwrap());
        assert!(store.compare_and_swap_upper_bound(&id, Some(5), Some(25), false).await.unwrap());
        assert_eq!(store.read_current_upper_bound(&id).await.unwrap(), Some(25));
        assert!(store.compare_and_swap_upper_bound(&id, Some(25), None, true).await.unwrap());
        assert_eq!(store.read_current_upper_bound(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_and_duplicate_sequences_are_reported() {
        let store = LocalSequenceStore::in_memory(100);
        let id = SequenceIdentity::new("APP", "S");
        let e = store.read_current_upper_bound(&id).await.unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::NotFound);
        store.create_sequence(&id, integer_config(), 0).await.unwrap();
        let e = store.create_sequence(&id, integer_config(), 0).await.unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::Malformed);
        store.drop_sequence(&id).await.unwrap();
        let e = store.load_config(&id).await.unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::NotFound);
        let e = store.drop_sequence(&id).await.unwrap_err();
        assert_eq!(e.kind(), &SeqgenErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rows_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequences.json");
        let id = SequenceIdentity::new("APP", "S");
        {
            let store = LocalSequenceStore::with_persistence(&path, 100).await.unwrap();
            store.create_sequence(&id, integer_config(), 1).await.unwrap();
            assert!(
                store
                    .compare_and_swap_upper_bound(&id, Some(1), Some(21), false)
                    .await
                    .unwrap()
            );
        }
        let store = LocalSequenceStore::with_persistence(&path, 100).await.unwrap();
        assert_eq!(store.read_current_upper_bound(&id).await.unwrap(), Some(21));
        assert_eq!(store.load_config(&id).await.unwrap(), integer_config());
    }

    #[tokio::test]
    async fn every_write_replaces_the_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequences.json");
        let id = SequenceIdentity::new("APP", "S");
        let store = LocalSequenceStore::with_persistence(&path, 100).await.unwrap();
        store.create_sequence(&id, integer_config(), 1).await.unwrap();
        assert!(
            store
                .compare_and_swap_upper_bound(&id, Some(1), Some(41), true)
                .await
                .unwrap()
        );
        assert!(!path.with_extension("tmp").exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        let stored_rows = serde_json::from_str::<Vec<StoredRow>>(&contents).unwrap();
        assert_eq!(stored_rows.len(), 1);
        assert_eq!(stored_rows[0].current_value, Some(41));
    }
}
