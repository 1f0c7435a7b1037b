//! File-backed stores.
//!
//! Each organization's alerting configuration lives in its own JSON file,
//! `alerting-<org>.json`, inside the data directory. Provenance records for all
//! organizations share `provenance.json`. Writes go to a temporary file that is
//! renamed over the target, so a reader never sees a half-written document.

use super::memory::{undo_provenance, ProvenanceRecords};
use super::{Journaled, StoreError, WriteJournal};
use crate::core::{
    AlertingConfig, ConcurrencyToken, ConfigStore, OrgId, ProvenanceStore, StoredConfig,
};
use crate::provenance::Provenance;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const CONFIG_FILE_PREFIX: &str = "alerting-";
const PROVENANCE_FILE: &str = "provenance.json";

/// Stores alerting configurations as JSON files in a directory.
#[derive(Debug)]
pub struct FileConfigStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    journal: WriteJournal<OrgId, Vec<u8>>,
}

impl FileConfigStore {
    /// Opens the store, creating `dir` if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Opened file config store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            journal: WriteJournal::default(),
        })
    }

    pub fn path_for(&self, org_id: OrgId) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", CONFIG_FILE_PREFIX, org_id))
    }

    fn read(&self, org_id: OrgId) -> Result<AlertingConfig, StoreError> {
        parse_config(read_optional(&self.path_for(org_id))?.as_deref())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn fetch_latest(&self, org_id: OrgId) -> Result<StoredConfig, StoreError> {
        let config = self.read(org_id)?;
        let token = ConcurrencyToken::of(&config)?;
        Ok(StoredConfig { config, token })
    }

    async fn save(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        expected: &ConcurrencyToken,
    ) -> Result<ConcurrencyToken, StoreError> {
        let _guard = self.lock();
        let path = self.path_for(org_id);
        let before = read_optional(&path)?;
        let actual = ConcurrencyToken::of(&parse_config(before.as_deref())?)?;
        if actual != *expected {
            return Err(StoreError::Conflict {
                org_id,
                expected: expected.clone(),
                actual,
            });
        }

        let bytes = serde_json::to_vec_pretty(config)?;
        write_atomic(&path, &bytes)?;
        self.journal.record(org_id, before, Some(bytes));
        let token = ConcurrencyToken::of(config)?;
        debug!(%org_id, %token, "Saved alerting configuration");
        Ok(token)
    }
}

impl Journaled for FileConfigStore {
    fn open_journal(&self) {
        self.journal.open();
    }

    fn discard_journal(&self) {
        self.journal.close();
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        let _guard = self.lock();
        for entry in self.journal.close() {
            let path = self.path_for(entry.key);
            if !entry.is_current(read_optional(&path)?.as_ref()) {
                warn!(org_id = %entry.key, "Configuration file changed by another writer, not undoing");
                continue;
            }
            match &entry.before {
                Some(bytes) => write_atomic(&path, bytes)?,
                None => remove_optional(&path)?,
            }
            debug!(org_id = %entry.key, "Undid configuration write");
        }
        Ok(())
    }
}

/// Stores provenance records for every organization in one JSON file.
#[derive(Debug)]
pub struct FileProvenanceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    journal: WriteJournal<(OrgId, String), Provenance>,
}

impl FileProvenanceStore {
    /// Opens the store at `dir/provenance.json`, creating `dir` if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            path: dir.as_ref().join(PROVENANCE_FILE),
            write_lock: Mutex::new(()),
            journal: WriteJournal::default(),
        })
    }

    fn read(&self) -> Result<ProvenanceRecords, StoreError> {
        match read_optional(&self.path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(ProvenanceRecords::new()),
        }
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ProvenanceRecords),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read()?;
        apply(&mut records);
        write_atomic(&self.path, &serde_json::to_vec_pretty(&records)?)
    }
}

#[async_trait]
impl ProvenanceStore for FileProvenanceStore {
    async fn get(&self, org_id: OrgId, uid: &str) -> Result<Provenance, StoreError> {
        Ok(self
            .read()?
            .get(&org_id)
            .and_then(|records| records.get(uid))
            .copied()
            .unwrap_or_default())
    }

    async fn get_all(&self, org_id: OrgId) -> Result<HashMap<String, Provenance>, StoreError> {
        Ok(self.read()?.remove(&org_id).unwrap_or_default())
    }

    async fn set(&self, org_id: OrgId, uid: &str, provenance: Provenance) -> Result<(), StoreError> {
        self.update(|records| {
            let before = records
                .entry(org_id)
                .or_default()
                .insert(uid.to_string(), provenance);
            self.journal
                .record((org_id, uid.to_string()), before, Some(provenance));
        })
    }

    async fn delete(&self, org_id: OrgId, uid: &str) -> Result<(), StoreError> {
        self.update(|records| {
            let before = records
                .get_mut(&org_id)
                .and_then(|org_records| org_records.remove(uid));
            self.journal.record((org_id, uid.to_string()), before, None);
        })
    }
}

impl Journaled for FileProvenanceStore {
    fn open_journal(&self) {
        self.journal.open();
    }

    fn discard_journal(&self) {
        self.journal.close();
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        let entries = self.journal.close();
        if entries.is_empty() {
            return Ok(());
        }
        self.update(|records| {
            for entry in entries {
                undo_provenance(records, entry);
            }
        })
    }
}

fn parse_config(bytes: Option<&[u8]>) -> Result<AlertingConfig, StoreError> {
    match bytes {
        Some(bytes) => Ok(serde_json::from_slice(bytes)?),
        None => Ok(AlertingConfig::default()),
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
