//! Storage backends for alerting configurations and provenance records.
//!
//! Both backends (`memory`, `file`) implement `Journaled` so that a
//! `JournalTransactionManager` can group a config save and a provenance
//! write into one unit of work.

pub mod file;
pub mod memory;
pub mod transaction;

pub use file::{FileConfigStore, FileProvenanceStore};
pub use memory::{InMemoryConfigStore, InMemoryProvenanceStore};
pub use transaction::JournalTransactionManager;

use crate::core::{ConcurrencyToken, OrgId};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("configuration of org {org_id} changed since it was read (expected {expected}, found {actual})")]
    Conflict {
        org_id: OrgId,
        expected: ConcurrencyToken,
        actual: ConcurrencyToken,
    },

    #[error("failed to encode or decode stored data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// Writes made by a store while a unit of work is open, keyed by what they
/// touched. Each entry keeps the value the write replaced and the value it
/// left behind, so an undo can tell whether another writer got there since.
#[derive(Debug)]
pub struct WriteJournal<K, V> {
    entries: Mutex<Option<Vec<JournalEntry<K, V>>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry<K, V> {
    pub key: K,
    pub before: Option<V>,
    pub after: Option<V>,
}

impl<K, V: PartialEq> JournalEntry<K, V> {
    /// Whether `current` is still the value this write left behind.
    pub fn is_current(&self, current: Option<&V>) -> bool {
        self.after.as_ref() == current
    }
}

impl<K, V> Default for WriteJournal<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(None),
        }
    }
}

impl<K, V> WriteJournal<K, V> {
    pub fn open(&self) {
        *self.lock() = Some(Vec::new());
    }

    /// Records a write. Ignored while the journal is closed.
    pub fn record(&self, key: K, before: Option<V>, after: Option<V>) {
        if let Some(entries) = self.lock().as_mut() {
            entries.push(JournalEntry { key, before, after });
        }
    }

    /// Closes the journal and returns its entries, newest first.
    pub fn close(&self) -> Vec<JournalEntry<K, V>> {
        let mut entries = self.lock().take().unwrap_or_default();
        entries.reverse();
        entries
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<JournalEntry<K, V>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A store that can undo the writes it made inside a unit of work.
pub trait Journaled: Send + Sync {
    /// Starts recording writes.
    fn open_journal(&self);

    /// Stops recording and keeps the writes.
    fn discard_journal(&self);

    /// Stops recording and undoes the recorded writes, newest first. A key
    /// another writer changed since is left alone.
    fn undo_journal(&self) -> Result<(), StoreError>;
}
