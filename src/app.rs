//! Application wiring.
//!
//! `AppBuilder` turns a `Config` into a `ContactPointService` backed by the
//! file stores, and lets tests swap any collaborator. `App::run` executes one
//! command-line operation and renders its result as JSON.

use crate::access_control::{PermissionAccessControl, Requester, ACTION_PROVISIONING_READ_SECRETS};
use crate::cli::{Command, ContactPointArgs};
use crate::config::Config;
use crate::contact_points::ContactPointService;
use crate::core::{
    AccessControl, ConfigStore, ContactPoint, ContactPointQuery, EncryptionService, OrgId,
    ProvenanceStore, TransactionManager,
};
use crate::encryption::AesGcmEncryption;
use crate::store::{FileConfigStore, FileProvenanceStore, JournalTransactionManager};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Login the command-line tool acts under.
pub const CLI_LOGIN: &str = "cli";

/// A configured service together with the organization and requester the
/// command-line tool acts as.
pub struct App {
    service: ContactPointService,
    org_id: OrgId,
    requester: Requester,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn service(&self) -> &ContactPointService {
        &self.service
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Runs one operation and returns its JSON rendering.
    #[instrument(skip_all, fields(org_id = %self.org_id))]
    pub async fn run(&self, command: Command) -> Result<String> {
        let output = match command {
            Command::List { name, decrypt } => {
                let mut query = ContactPointQuery::new(self.org_id);
                query.name = name;
                query.decrypt = decrypt;
                let contact_points = self.service.list(&query, Some(&self.requester)).await?;
                serde_json::to_value(contact_points)?
            }
            Command::Get { uid, decrypt } => {
                let contact_point = self
                    .service
                    .get(self.org_id, &uid, decrypt, Some(&self.requester))
                    .await?;
                serde_json::to_value(contact_point)?
            }
            Command::Create { uid, contact_point } => {
                let provenance = contact_point.provenance;
                let mut request = to_contact_point(contact_point)?;
                request.uid = uid.unwrap_or_default();
                let created = self.service.create(self.org_id, request, provenance).await?;
                serde_json::to_value(created)?
            }
            Command::Update { uid, contact_point } => {
                let provenance = contact_point.provenance;
                let request = to_contact_point(contact_point)?.with_uid(uid);
                let updated = self.service.update(self.org_id, request, provenance).await?;
                serde_json::to_value(updated)?
            }
            Command::Delete { uid } => {
                self.service.delete(self.org_id, &uid).await?;
                json!({ "deleted": uid })
            }
        };
        Ok(serde_json::to_string_pretty(&output)?)
    }
}

fn to_contact_point(args: ContactPointArgs) -> Result<ContactPoint> {
    let settings: Value =
        serde_json::from_str(&args.settings).context("--settings is not valid JSON")?;
    if !settings.is_object() {
        bail!("--settings must be a JSON object");
    }
    let mut contact_point = ContactPoint::new(args.name, args.kind).with_settings(settings);
    contact_point.disable_resolve_message = args.disable_resolve_message;
    Ok(contact_point)
}

/// Stores that must be replaced together, since the transaction manager has
/// to cover both.
pub struct StoreOverride {
    pub config_store: Arc<dyn ConfigStore>,
    pub provenance_store: Arc<dyn ProvenanceStore>,
    pub transactions: Arc<dyn TransactionManager>,
}

/// Builder for the application.
pub struct AppBuilder {
    config: Config,
    store_override: Option<StoreOverride>,
    encryption_override: Option<Arc<dyn EncryptionService>>,
    access_control_override: Option<Arc<dyn AccessControl>>,
    requester_override: Option<Requester>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store_override: None,
            encryption_override: None,
            access_control_override: None,
            requester_override: None,
        }
    }

    /// Overrides the file stores and their transaction manager.
    pub fn store_override(mut self, stores: StoreOverride) -> Self {
        self.store_override = Some(stores);
        self
    }

    /// Overrides the encryption service.
    pub fn encryption_override(mut self, encryption: Arc<dyn EncryptionService>) -> Self {
        self.encryption_override = Some(encryption);
        self
    }

    /// Overrides the access control evaluator.
    pub fn access_control_override(mut self, access_control: Arc<dyn AccessControl>) -> Self {
        self.access_control_override = Some(access_control);
        self
    }

    /// Overrides the requester commands run as.
    pub fn requester_override(mut self, requester: Requester) -> Self {
        self.requester_override = Some(requester);
        self
    }

    /// Opens the stores and wires the service.
    #[instrument(skip_all)]
    pub fn build(self) -> Result<App> {
        let config = self.config;
        config.validate()?;

        let stores = match self.store_override {
            Some(stores) => stores,
            None => {
                let dir = &config.storage.data_dir;
                let config_store = Arc::new(
                    FileConfigStore::open(dir)
                        .with_context(|| format!("failed to open {}", dir.display()))?,
                );
                let provenance_store = Arc::new(FileProvenanceStore::open(dir)?);
                let transactions = JournalTransactionManager::new()
                    .with_participant(config_store.clone())
                    .with_participant(provenance_store.clone());
                StoreOverride {
                    config_store,
                    provenance_store,
                    transactions: Arc::new(transactions),
                }
            }
        };

        let encryption = match self.encryption_override {
            Some(encryption) => encryption,
            None => {
                if config.uses_dev_secret() {
                    warn!("Using the development encryption key; set encryption.secret_key");
                }
                Arc::new(AesGcmEncryption::from_secret(&config.encryption.secret_key))
            }
        };
        let access_control = self
            .access_control_override
            .unwrap_or_else(|| Arc::new(PermissionAccessControl));

        let service = ContactPointService::new(
            stores.config_store,
            stores.provenance_store,
            stores.transactions,
            encryption,
            access_control,
        )
        .with_notifiers(config.notifier_registry());

        let requester = self.requester_override.unwrap_or_else(|| {
            Requester::new(CLI_LOGIN, config.org_id).with_permission(ACTION_PROVISIONING_READ_SECRETS)
        });
        info!(org_id = %config.org_id, data_dir = %config.storage.data_dir.display(), "Application configured");

        Ok(App {
            service,
            org_id: config.org_id,
            requester,
        })
    }
}
