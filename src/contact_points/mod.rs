//! Contact point provisioning: validation, provenance checks, secret handling
//! and atomic persistence of receiver entries.

pub mod service;
pub mod validation;

pub use service::ContactPointService;

use crate::access_control::AccessControlError;
use crate::encryption::EncryptionError;
use crate::provenance::Provenance;
use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by `ContactPointService`.
///
/// Every rejection leaves the stored document and provenance records as they
/// were.
#[derive(Error, Debug)]
pub enum ContactPointError {
    #[error("invalid contact point: {0}")]
    Validation(String),

    #[error("contact point with uid '{0}' already exists")]
    DuplicateIdentity(String),

    #[error("contact point with uid '{0}' not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cannot change provenance from '{from}' to '{to}'")]
    ProvenanceViolation { from: Provenance, to: Provenance },

    #[error("alerting configuration was changed by another writer, fetch it again and retry")]
    ConcurrencyConflict,

    #[error("contact point '{0}' is currently used by a notification policy")]
    InUse(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    AccessControl(#[from] AccessControlError),
}

impl From<StoreError> for ContactPointError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => ContactPointError::ConcurrencyConflict,
            other => ContactPointError::Store(other),
        }
    }
}

impl ContactPointError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ContactPointError::Validation(message.into())
    }
}
