#![allow(dead_code)]
//! Shared fakes and fixtures for the integration tests.

pub mod fakes;
pub mod fixtures;

use contactpoints::access_control::{Requester, ACTION_PROVISIONING_READ_SECRETS};
use contactpoints::core::{AlertingConfig, OrgId, ProvenanceStore};
use contactpoints::store::JournalTransactionManager;
use contactpoints::ContactPointService;
use fakes::{CountingEncryption, FailingProvenanceStore, InterceptingConfigStore, ToggleAccessControl};
use std::sync::Arc;

pub const ORG: OrgId = OrgId(1);

/// A service wired to inspectable fakes.
pub struct TestService {
    pub service: ContactPointService,
    pub config_store: Arc<InterceptingConfigStore>,
    pub provenance_store: Arc<FailingProvenanceStore>,
    pub encryption: Arc<CountingEncryption>,
    pub access_control: Arc<ToggleAccessControl>,
}

impl TestService {
    /// Builds a service whose organization `ORG` starts with `config`.
    pub fn with_config(config: AlertingConfig) -> Self {
        let config_store = Arc::new(InterceptingConfigStore::new(ORG, config));
        let provenance_store = Arc::new(FailingProvenanceStore::new());
        let encryption = Arc::new(CountingEncryption::new());
        let access_control = Arc::new(ToggleAccessControl::new(true));
        let xact = JournalTransactionManager::new()
            .with_participant(config_store.clone())
            .with_participant(provenance_store.clone());

        let service = ContactPointService::new(
            config_store.clone(),
            provenance_store.clone(),
            Arc::new(xact),
            encryption.clone(),
            access_control.clone(),
        );
        Self {
            service,
            config_store,
            provenance_store,
            encryption,
            access_control,
        }
    }

    /// Builds a service seeded with `fixtures::slack_receiver_config`.
    pub async fn seeded() -> Self {
        let encryption = CountingEncryption::new();
        let config = fixtures::slack_receiver_config(&encryption).await;
        Self::with_config(config)
    }

    pub fn stored(&self) -> AlertingConfig {
        self.config_store.current(ORG)
    }

    pub async fn provenance_store_is_empty(&self) -> bool {
        self.provenance_store.get_all(ORG).await.unwrap().is_empty()
    }
}

/// A requester of `ORG` that may read secrets.
pub fn admin() -> Requester {
    Requester::new("admin", ORG).with_permission(ACTION_PROVISIONING_READ_SECRETS)
}

/// A requester of `ORG` without any permission.
pub fn viewer() -> Requester {
    Requester::new("viewer", ORG)
}
