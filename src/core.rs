//! Core domain types and collaborator traits for contact point provisioning
//!
//! This module defines the alerting configuration document, the contact point
//! records exchanged with callers, and the trait contracts for the external
//! stores and services the `ContactPointService` orchestrates.

use crate::access_control::{AccessControlError, Requester};
use crate::encryption::EncryptionError;
use crate::provenance::Provenance;
use crate::secrets::Settings;
use crate::store::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Identifies the organization that owns an alerting configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub i64);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrgId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// =============================================================================
// Alerting configuration document
// =============================================================================

/// The alerting configuration document of one organization.
///
/// Only the routing tree and the receiver groups are modelled; every other key
/// is carried through `extra` untouched so a rewrite never drops it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Root of the routing tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    /// Receiver groups, in document order.
    #[serde(default)]
    pub receivers: Vec<ReceiverGroup>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlertingConfig {
    /// Finds the entry with the given uid along with the group that holds it.
    pub fn find_receiver(&self, uid: &str) -> Option<(&ReceiverGroup, &ReceiverEntry)> {
        self.receivers.iter().find_map(|group| {
            group
                .entries
                .iter()
                .find(|entry| entry.uid == uid)
                .map(|entry| (group, entry))
        })
    }

    /// Returns the group with the given name, if any.
    pub fn group(&self, name: &str) -> Option<&ReceiverGroup> {
        self.receivers.iter().find(|group| group.name == name)
    }

    /// Total number of receiver entries across all groups.
    pub fn receiver_count(&self) -> usize {
        self.receivers.iter().map(|group| group.entries.len()).sum()
    }
}

/// A node of the routing tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Name of the receiver group this node routes to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    /// Child routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Route {
    /// Creates a leaf route pointing at `receiver`.
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            ..Default::default()
        }
    }

    /// Replaces the child routes of this node.
    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = routes;
        self
    }
}

/// A named group of receiver entries, referenced as a unit by routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverGroup {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<ReceiverEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReceiverGroup {
    pub fn new(name: impl Into<String>, entries: Vec<ReceiverEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            extra: Map::new(),
        }
    }
}

/// A single notifier integration inside a receiver group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverEntry {
    pub uid: String,
    pub name: String,
    /// Notifier kind, e.g. "slack".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    #[serde(flatten)]
    pub settings: Settings,
    /// Keys outside the modelled fields. Must follow `settings`, which claims
    /// its two maps first.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReceiverEntry {
    /// Creates an entry with no settings.
    pub fn new(uid: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }
}

/// Opaque hash of a stored `AlertingConfig`, used as a compare-and-swap token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    /// Computes the token of a document from its canonical JSON encoding.
    pub fn of(config: &AlertingConfig) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_vec(config)?;
        Ok(Self(blake3::hash(&encoded).to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configuration document together with the token it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConfig {
    pub config: AlertingConfig,
    pub token: ConcurrencyToken,
}

// =============================================================================
// Contact point records
// =============================================================================

/// The caller-facing view of a receiver entry.
///
/// `settings` is `None` when the caller sent no settings at all; that is
/// distinct from an empty map and both are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    #[serde(default)]
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    #[serde(default)]
    pub settings: Option<Map<String, Value>>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl ContactPoint {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Sets the settings from a JSON value. Anything but an object clears them.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = match settings {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }
}

/// Filter for listing contact points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactPointQuery {
    pub org_id: OrgId,
    /// Only return entries with this name.
    pub name: Option<String>,
    /// Return secure settings in cleartext. Requires the read-secrets permission.
    pub decrypt: bool,
}

impl ContactPointQuery {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            name: None,
            decrypt: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn decrypted(mut self) -> Self {
        self.decrypt = true;
        self
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Holds the alerting configuration document of each organization.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads the latest document and the token it is stored at.
    ///
    /// An organization with no stored document reads as an empty one.
    async fn fetch_latest(&self, org_id: OrgId) -> Result<StoredConfig, StoreError>;

    /// Replaces the document, provided the live token still equals `expected`.
    ///
    /// # Returns
    /// * `Ok(token)` with the token of the newly stored document
    /// * `Err(StoreError::Conflict)` if another writer saved in between
    async fn save(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        expected: &ConcurrencyToken,
    ) -> Result<ConcurrencyToken, StoreError>;
}

/// Persists the provenance of each contact point identity.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    /// Returns the provenance of `uid`, `Provenance::None` if unrecorded.
    async fn get(&self, org_id: OrgId, uid: &str) -> Result<Provenance, StoreError>;

    /// Returns every recorded provenance of the organization, keyed by uid.
    async fn get_all(&self, org_id: OrgId) -> Result<HashMap<String, Provenance>, StoreError>;

    async fn set(&self, org_id: OrgId, uid: &str, provenance: Provenance) -> Result<(), StoreError>;

    async fn delete(&self, org_id: OrgId, uid: &str) -> Result<(), StoreError>;
}

/// Encrypts and decrypts secure setting payloads.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn encrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError>;

    async fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError>;
}

/// Answers yes/no authorization questions for a requester.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Whether `requester` holds `action` in its own organization.
    async fn has_permission(
        &self,
        requester: &Requester,
        action: &str,
    ) -> Result<bool, AccessControlError>;
}

/// Starts units of work spanning the config and provenance stores.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// A scoped unit of work. Writes made while it is open become durable on
/// `commit` and are undone on `rollback`.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
