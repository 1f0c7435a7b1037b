//! A transaction manager for stores that journal their writes.
//!
//! `begin` waits for any other open unit of work, then opens the journal of
//! every participating store. `rollback` undoes the journaled writes and
//! `commit` keeps them. A unit dropped without either is rolled back.

use super::{Journaled, StoreError};
use crate::core::{TransactionManager, UnitOfWork};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error};

/// Groups writes to several `Journaled` stores into units of work.
#[derive(Clone, Default)]
pub struct JournalTransactionManager {
    participants: Vec<Arc<dyn Journaled>>,
    lock: Arc<Mutex<()>>,
}

impl JournalTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a store whose writes are covered by each unit of work.
    pub fn with_participant(mut self, store: Arc<dyn Journaled>) -> Self {
        self.participants.push(store);
        self
    }
}

#[async_trait]
impl TransactionManager for JournalTransactionManager {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.lock.clone().lock_owned().await;
        for store in &self.participants {
            store.open_journal();
        }
        debug!(participants = self.participants.len(), "Began unit of work");
        Ok(Box::new(JournalUnit {
            participants: self.participants.clone(),
            open: true,
            _guard: guard,
        }))
    }
}

struct JournalUnit {
    participants: Vec<Arc<dyn Journaled>>,
    open: bool,
    _guard: OwnedMutexGuard<()>,
}

impl JournalUnit {
    fn undo_all(&mut self) -> Result<(), StoreError> {
        self.open = false;
        let mut first_error = None;
        for store in self.participants.iter().rev() {
            if let Err(e) = store.undo_journal() {
                error!(error = %e, "Failed to undo writes during rollback");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UnitOfWork for JournalUnit {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut unit = self;
        unit.open = false;
        for store in &unit.participants {
            store.discard_journal();
        }
        debug!("Committed unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!("Rolling back unit of work");
        let mut unit = self;
        unit.undo_all()
    }
}

impl Drop for JournalUnit {
    fn drop(&mut self) {
        if self.open {
            let _ = self.undo_all();
        }
    }
}
