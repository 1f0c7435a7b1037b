//! Requesters and permission evaluation.
//!
//! Only the yes/no decision matters to the provisioning core. The shipped
//! `PermissionAccessControl` answers it from the action set the requester
//! carries for its organization.

use crate::core::{AccessControl, OrgId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Read contact point secrets in cleartext.
pub const ACTION_PROVISIONING_READ_SECRETS: &str = "alert.provisioning.secrets:read";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessControlError {
    #[error("permission evaluation failed: {0}")]
    Evaluation(String),
}

/// A signed-in subject acting within one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub login: String,
    pub org_id: OrgId,
    /// Granted actions, per organization.
    pub permissions: HashMap<OrgId, HashSet<String>>,
}

impl Requester {
    pub fn new(login: impl Into<String>, org_id: OrgId) -> Self {
        Self {
            login: login.into(),
            org_id,
            permissions: HashMap::new(),
        }
    }

    /// Grants `action` in the requester's own organization.
    pub fn with_permission(mut self, action: &str) -> Self {
        self.permissions
            .entry(self.org_id)
            .or_default()
            .insert(action.to_string());
        self
    }

    pub fn has_action(&self, org_id: OrgId, action: &str) -> bool {
        self.permissions
            .get(&org_id)
            .is_some_and(|actions| actions.contains(action))
    }
}

/// Grants an action when the requester carries it in its own organization.
#[derive(Debug, Clone, Default)]
pub struct PermissionAccessControl;

#[async_trait]
impl AccessControl for PermissionAccessControl {
    async fn has_permission(
        &self,
        requester: &Requester,
        action: &str,
    ) -> Result<bool, AccessControlError> {
        Ok(requester.has_action(requester.org_id, action))
    }
}
