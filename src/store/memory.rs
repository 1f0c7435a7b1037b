//! In-memory stores, for tests and for embedding the service without a
//! persistent backend.

use super::{JournalEntry, Journaled, StoreError, WriteJournal};
use crate::core::{
    AlertingConfig, ConcurrencyToken, ConfigStore, OrgId, ProvenanceStore, StoredConfig,
};
use crate::provenance::Provenance;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Holds one `AlertingConfig` per organization.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: Mutex<HashMap<OrgId, AlertingConfig>>,
    journal: WriteJournal<OrgId, AlertingConfig>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a document for `org_id`.
    pub fn with_config(self, org_id: OrgId, config: AlertingConfig) -> Self {
        self.lock().insert(org_id, config);
        self
    }

    /// The document currently stored for `org_id`.
    pub fn current(&self, org_id: OrgId) -> AlertingConfig {
        self.lock().get(&org_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OrgId, AlertingConfig>> {
        self.configs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn fetch_latest(&self, org_id: OrgId) -> Result<StoredConfig, StoreError> {
        let config = self.current(org_id);
        let token = ConcurrencyToken::of(&config)?;
        Ok(StoredConfig { config, token })
    }

    async fn save(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        expected: &ConcurrencyToken,
    ) -> Result<ConcurrencyToken, StoreError> {
        let mut configs = self.lock();
        let live = configs.get(&org_id).cloned();
        let actual = ConcurrencyToken::of(live.as_ref().unwrap_or(&AlertingConfig::default()))?;
        if actual != *expected {
            return Err(StoreError::Conflict {
                org_id,
                expected: expected.clone(),
                actual,
            });
        }

        let token = ConcurrencyToken::of(config)?;
        configs.insert(org_id, config.clone());
        self.journal.record(org_id, live, Some(config.clone()));
        debug!(%org_id, %token, "Saved alerting configuration");
        Ok(token)
    }
}

impl Journaled for InMemoryConfigStore {
    fn open_journal(&self) {
        self.journal.open();
    }

    fn discard_journal(&self) {
        self.journal.close();
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        let mut configs = self.lock();
        for entry in self.journal.close() {
            if !entry.is_current(configs.get(&entry.key)) {
                warn!(org_id = %entry.key, "Configuration changed by another writer, not undoing");
                continue;
            }
            match entry.before {
                Some(config) => configs.insert(entry.key, config),
                None => configs.remove(&entry.key),
            };
        }
        Ok(())
    }
}

pub(super) type ProvenanceRecords = HashMap<OrgId, HashMap<String, Provenance>>;

/// Holds provenance records per organization and uid.
#[derive(Debug, Default)]
pub struct InMemoryProvenanceStore {
    records: Mutex<ProvenanceRecords>,
    journal: WriteJournal<(OrgId, String), Provenance>,
}

impl InMemoryProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProvenanceRecords> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProvenanceStore for InMemoryProvenanceStore {
    async fn get(&self, org_id: OrgId, uid: &str) -> Result<Provenance, StoreError> {
        Ok(self
            .lock()
            .get(&org_id)
            .and_then(|records| records.get(uid))
            .copied()
            .unwrap_or_default())
    }

    async fn get_all(&self, org_id: OrgId) -> Result<HashMap<String, Provenance>, StoreError> {
        Ok(self.lock().get(&org_id).cloned().unwrap_or_default())
    }

    async fn set(&self, org_id: OrgId, uid: &str, provenance: Provenance) -> Result<(), StoreError> {
        let before = self
            .lock()
            .entry(org_id)
            .or_default()
            .insert(uid.to_string(), provenance);
        self.journal
            .record((org_id, uid.to_string()), before, Some(provenance));
        Ok(())
    }

    async fn delete(&self, org_id: OrgId, uid: &str) -> Result<(), StoreError> {
        let before = self
            .lock()
            .get_mut(&org_id)
            .and_then(|records| records.remove(uid));
        self.journal.record((org_id, uid.to_string()), before, None);
        Ok(())
    }
}

impl Journaled for InMemoryProvenanceStore {
    fn open_journal(&self) {
        self.journal.open();
    }

    fn discard_journal(&self) {
        self.journal.close();
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        let mut records = self.lock();
        for entry in self.journal.close() {
            undo_provenance(&mut records, entry);
        }
        Ok(())
    }
}

/// Puts back the provenance a journaled write replaced, unless the record
/// changed again since.
pub(super) fn undo_provenance(
    records: &mut ProvenanceRecords,
    entry: JournalEntry<(OrgId, String), Provenance>,
) {
    let (org_id, uid) = entry.key.clone();
    let current = records.get(&org_id).and_then(|org| org.get(&uid));
    if !entry.is_current(current) {
        warn!(%org_id, %uid, "Provenance changed by another writer, not undoing");
        return;
    }
    match entry.before {
        Some(provenance) => {
            records.entry(org_id).or_default().insert(uid, provenance);
        }
        None => {
            if let Some(org) = records.get_mut(&org_id) {
                org.remove(&uid);
            }
        }
    }
}
