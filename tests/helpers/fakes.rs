//! Fake collaborators that record calls or inject failures.

use async_trait::async_trait;
use contactpoints::access_control::{AccessControlError, Requester};
use contactpoints::core::{
    AccessControl, AlertingConfig, ConcurrencyToken, ConfigStore, EncryptionService, OrgId,
    ProvenanceStore, StoredConfig,
};
use contactpoints::encryption::{AesGcmEncryption, EncryptionError};
use contactpoints::provenance::Provenance;
use contactpoints::store::{
    InMemoryConfigStore, InMemoryProvenanceStore, Journaled, StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const TEST_SECRET: &str = "integration-test-secret";

/// An in-memory config store that records the token of every save and can
/// simulate another writer landing between a fetch and the following save.
pub struct InterceptingConfigStore {
    inner: InMemoryConfigStore,
    expected_tokens: Mutex<Vec<ConcurrencyToken>>,
    fetched_tokens: Mutex<Vec<ConcurrencyToken>>,
    concurrent_write: Mutex<Option<AlertingConfig>>,
}

impl InterceptingConfigStore {
    pub fn new(org_id: OrgId, config: AlertingConfig) -> Self {
        Self {
            inner: InMemoryConfigStore::new().with_config(org_id, config),
            expected_tokens: Mutex::new(Vec::new()),
            fetched_tokens: Mutex::new(Vec::new()),
            concurrent_write: Mutex::new(None),
        }
    }

    /// Stores `config` right after the next fetch returns, as if another
    /// writer had saved it in between.
    pub fn write_after_next_fetch(&self, config: AlertingConfig) {
        *self.concurrent_write.lock().unwrap() = Some(config);
    }

    pub fn current(&self, org_id: OrgId) -> AlertingConfig {
        self.inner.current(org_id)
    }

    /// Tokens passed to `save`, oldest first.
    pub fn expected_tokens(&self) -> Vec<ConcurrencyToken> {
        self.expected_tokens.lock().unwrap().clone()
    }

    /// Tokens returned by `fetch_latest`, oldest first.
    pub fn fetched_tokens(&self) -> Vec<ConcurrencyToken> {
        self.fetched_tokens.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.expected_tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl ConfigStore for InterceptingConfigStore {
    async fn fetch_latest(&self, org_id: OrgId) -> Result<StoredConfig, StoreError> {
        let stored = self.inner.fetch_latest(org_id).await?;
        self.fetched_tokens.lock().unwrap().push(stored.token.clone());

        let pending = self.concurrent_write.lock().unwrap().take();
        if let Some(other) = pending {
            self.inner.save(org_id, &other, &stored.token).await?;
        }
        Ok(stored)
    }

    async fn save(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        expected: &ConcurrencyToken,
    ) -> Result<ConcurrencyToken, StoreError> {
        self.expected_tokens.lock().unwrap().push(expected.clone());
        self.inner.save(org_id, config, expected).await
    }
}

impl Journaled for InterceptingConfigStore {
    fn open_journal(&self) {
        self.inner.open_journal()
    }

    fn discard_journal(&self) {
        self.inner.discard_journal()
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        self.inner.undo_journal()
    }
}

/// An in-memory provenance store whose writes can be made to fail.
#[derive(Default)]
pub struct FailingProvenanceStore {
    inner: InMemoryProvenanceStore,
    fail_writes: AtomicBool,
}

impl FailingProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Transaction("injected provenance failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProvenanceStore for FailingProvenanceStore {
    async fn get(&self, org_id: OrgId, uid: &str) -> Result<Provenance, StoreError> {
        self.inner.get(org_id, uid).await
    }

    async fn get_all(&self, org_id: OrgId) -> Result<HashMap<String, Provenance>, StoreError> {
        self.inner.get_all(org_id).await
    }

    async fn set(&self, org_id: OrgId, uid: &str, provenance: Provenance) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(org_id, uid, provenance).await
    }

    async fn delete(&self, org_id: OrgId, uid: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(org_id, uid).await
    }
}

impl Journaled for FailingProvenanceStore {
    fn open_journal(&self) {
        self.inner.open_journal()
    }

    fn discard_journal(&self) {
        self.inner.discard_journal()
    }

    fn undo_journal(&self) -> Result<(), StoreError> {
        self.inner.undo_journal()
    }
}

/// AES-GCM encryption under a fixed test secret that counts decryptions.
pub struct CountingEncryption {
    inner: AesGcmEncryption,
    decryptions: AtomicUsize,
}

impl CountingEncryption {
    pub fn new() -> Self {
        Self {
            inner: AesGcmEncryption::from_secret(TEST_SECRET),
            decryptions: AtomicUsize::new(0),
        }
    }

    pub fn decryptions(&self) -> usize {
        self.decryptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EncryptionService for CountingEncryption {
    async fn encrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        self.inner.encrypt(payload).await
    }

    async fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        self.decryptions.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(payload).await
    }
}

/// Access control with a switchable answer.
pub struct ToggleAccessControl {
    allow: AtomicBool,
    calls: AtomicUsize,
}

impl ToggleAccessControl {
    pub fn new(allow: bool) -> Self {
        Self {
            allow: AtomicBool::new(allow),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_allow(&self, allow: bool) {
        self.allow.store(allow, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessControl for ToggleAccessControl {
    async fn has_permission(
        &self,
        _requester: &Requester,
        _action: &str,
    ) -> Result<bool, AccessControlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.allow.load(Ordering::SeqCst))
    }
}
