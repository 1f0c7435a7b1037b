//! The contact point service.
//!
//! Every write follows the same path: fetch the latest document and its
//! token, validate, stitch the entry in, then save the document and the
//! provenance record inside one unit of work. The document save is
//! conditioned on the token read at fetch time, and a conflict is returned
//! to the caller as-is.

use super::validation::{generate_uid, validate_contact_point, validate_merged_settings};
use super::ContactPointError;
use crate::access_control::{Requester, ACTION_PROVISIONING_READ_SECRETS};
use crate::core::{
    AccessControl, AlertingConfig, ConcurrencyToken, ConfigStore, ContactPoint,
    ContactPointQuery, EncryptionService, OrgId, ProvenanceStore, ReceiverEntry,
    TransactionManager,
};
use crate::provenance::Provenance;
use crate::secrets::{NotifierRegistry, NotifierSchema, Setting, Settings, SettingsCipher, REDACTED_VALUE};
use crate::stitching::{is_contact_point_in_use, remove_receiver, stitch_receiver};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a write does to the provenance store.
enum ProvenanceChange<'a> {
    Set(&'a str, Provenance),
    Delete(&'a str),
}

/// Manages the contact points of every organization.
pub struct ContactPointService {
    config_store: Arc<dyn ConfigStore>,
    provenance_store: Arc<dyn ProvenanceStore>,
    xact: Arc<dyn TransactionManager>,
    encryption: Arc<dyn EncryptionService>,
    access_control: Arc<dyn AccessControl>,
    notifiers: Arc<NotifierRegistry>,
}

impl ContactPointService {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        provenance_store: Arc<dyn ProvenanceStore>,
        xact: Arc<dyn TransactionManager>,
        encryption: Arc<dyn EncryptionService>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            config_store,
            provenance_store,
            xact,
            encryption,
            access_control,
            notifiers: Arc::new(NotifierRegistry::builtin()),
        }
    }

    /// Replaces the registry used to tell secure and required settings apart.
    pub fn with_notifiers(mut self, notifiers: NotifierRegistry) -> Self {
        self.notifiers = Arc::new(notifiers);
        self
    }

    /// Lists the contact points of `query.org_id`.
    ///
    /// Secure settings are shown as `REDACTED_VALUE` unless `query.decrypt` is
    /// set, which requires a requester of the same organization holding the
    /// read-secrets permission.
    #[instrument(skip_all, fields(org_id = %query.org_id, decrypt = query.decrypt))]
    pub async fn list(
        &self,
        query: &ContactPointQuery,
        requester: Option<&Requester>,
    ) -> Result<Vec<ContactPoint>, ContactPointError> {
        if query.decrypt {
            self.authorize_decrypt(query.org_id, requester).await?;
        }

        let stored = self.config_store.fetch_latest(query.org_id).await?;
        let provenances = self.provenance_store.get_all(query.org_id).await?;

        let views = stored
            .config
            .receivers
            .iter()
            .filter(|group| query.name.as_ref().map_or(true, |name| *name == group.name))
            .flat_map(|group| group.entries.iter().map(move |entry| (group.name.as_str(), entry)))
            .map(|(name, entry)| {
                let provenance = provenances.get(&entry.uid).copied().unwrap_or_default();
                self.render(name, entry, provenance, query.decrypt)
            });
        let contact_points = try_join_all(views).await?;
        debug!(count = contact_points.len(), "Listed contact points");
        Ok(contact_points)
    }

    /// Returns a single contact point.
    #[instrument(skip_all, fields(org_id = %org_id, uid = %uid))]
    pub async fn get(
        &self,
        org_id: OrgId,
        uid: &str,
        decrypt: bool,
        requester: Option<&Requester>,
    ) -> Result<ContactPoint, ContactPointError> {
        if decrypt {
            self.authorize_decrypt(org_id, requester).await?;
        }
        let stored = self.config_store.fetch_latest(org_id).await?;
        let (group, entry) = stored
            .config
            .find_receiver(uid)
            .ok_or_else(|| ContactPointError::NotFound(uid.to_string()))?;
        let provenance = self.provenance_store.get(org_id, uid).await?;
        self.render(&group.name, entry, provenance, decrypt).await
    }

    /// Creates a contact point and records its provenance.
    ///
    /// A uid is generated when the caller supplies none. Returns the stored
    /// contact point with secure settings redacted.
    #[instrument(skip_all, fields(org_id = %org_id, uid = %contact_point.uid))]
    pub async fn create(
        &self,
        org_id: OrgId,
        contact_point: ContactPoint,
        provenance: Provenance,
    ) -> Result<ContactPoint, ContactPointError> {
        let incoming = validate_contact_point(&contact_point)?.clone();
        let stored = self.config_store.fetch_latest(org_id).await?;

        let uid = if contact_point.uid.is_empty() {
            unused_uid(&stored.config)
        } else if stored.config.find_receiver(&contact_point.uid).is_some() {
            return Err(ContactPointError::DuplicateIdentity(contact_point.uid));
        } else {
            contact_point.uid
        };

        let schema = self.notifiers.schema(&contact_point.kind);
        let settings = self.merge_settings(schema, incoming, &Settings::new()).await?;
        validate_merged_settings(schema, &settings)?;

        let entry = ReceiverEntry {
            uid,
            name: contact_point.name,
            kind: contact_point.kind,
            disable_resolve_message: contact_point.disable_resolve_message,
            settings,
            extra: Map::new(),
        };
        let mut config = stored.config;
        stitch_receiver(&mut config, entry.clone());
        self.persist(
            org_id,
            &config,
            &stored.token,
            ProvenanceChange::Set(&entry.uid, provenance),
        )
        .await?;

        metrics::counter!("contact_point_writes_total", "op" => "create").increment(1);
        info!(uid = %entry.uid, name = %entry.name, kind = %entry.kind, %provenance, "Created contact point");
        Ok(redacted_view(&entry.name, &entry, provenance))
    }

    /// Updates the contact point with `contact_point.uid`.
    ///
    /// Secure settings that are omitted, null or `REDACTED_VALUE` keep their
    /// stored value. Plain settings are replaced wholesale.
    #[instrument(skip_all, fields(org_id = %org_id, uid = %contact_point.uid))]
    pub async fn update(
        &self,
        org_id: OrgId,
        contact_point: ContactPoint,
        provenance: Provenance,
    ) -> Result<ContactPoint, ContactPointError> {
        let incoming = validate_contact_point(&contact_point)?.clone();
        if contact_point.uid.is_empty() {
            return Err(ContactPointError::validation("uid should not be empty"));
        }

        let stored = self.config_store.fetch_latest(org_id).await?;
        let (existing, extra) = match stored.config.find_receiver(&contact_point.uid) {
            Some((_, entry)) => (entry.settings.clone(), entry.extra.clone()),
            None => return Err(ContactPointError::NotFound(contact_point.uid)),
        };

        let current = self.provenance_store.get(org_id, &contact_point.uid).await?;
        if !current.can_transition_to(provenance) {
            return Err(ContactPointError::ProvenanceViolation {
                from: current,
                to: provenance,
            });
        }

        let schema = self.notifiers.schema(&contact_point.kind);
        let settings = self.merge_settings(schema, incoming, &existing).await?;
        validate_merged_settings(schema, &settings)?;

        let entry = ReceiverEntry {
            uid: contact_point.uid,
            name: contact_point.name,
            kind: contact_point.kind,
            disable_resolve_message: contact_point.disable_resolve_message,
            settings,
            extra,
        };
        let mut config = stored.config;
        let modified = stitch_receiver(&mut config, entry.clone());
        if !modified {
            debug!("Receiver entry unchanged");
        }
        self.persist(
            org_id,
            &config,
            &stored.token,
            ProvenanceChange::Set(&entry.uid, provenance),
        )
        .await?;

        metrics::counter!("contact_point_writes_total", "op" => "update").increment(1);
        info!(uid = %entry.uid, name = %entry.name, modified, %provenance, "Updated contact point");
        Ok(redacted_view(&entry.name, &entry, provenance))
    }

    /// Deletes the contact point with `uid` and its provenance record.
    ///
    /// Fails with `InUse` while any route references the entry's group.
    #[instrument(skip_all, fields(org_id = %org_id, uid = %uid))]
    pub async fn delete(&self, org_id: OrgId, uid: &str) -> Result<(), ContactPointError> {
        let stored = self.config_store.fetch_latest(org_id).await?;
        let group_name = match stored.config.find_receiver(uid) {
            Some((group, _)) => group.name.clone(),
            None => return Err(ContactPointError::NotFound(uid.to_string())),
        };
        let in_use = stored
            .config
            .route
            .as_ref()
            .is_some_and(|route| is_contact_point_in_use(&group_name, route));
        if in_use {
            return Err(ContactPointError::InUse(group_name));
        }

        let mut config = stored.config;
        let removed = remove_receiver(&mut config, uid);
        debug!(group_removed = removed.is_some_and(|r| r.group_removed), "Removed receiver entry");
        self.persist(
            org_id,
            &config,
            &stored.token,
            ProvenanceChange::Delete(uid),
        )
        .await?;

        metrics::counter!("contact_point_writes_total", "op" => "delete").increment(1);
        info!(name = %group_name, "Deleted contact point");
        Ok(())
    }

    async fn authorize_decrypt(
        &self,
        org_id: OrgId,
        requester: Option<&Requester>,
    ) -> Result<(), ContactPointError> {
        let Some(requester) = requester else {
            return Err(ContactPointError::PermissionDenied(
                "decrypting secure settings requires a signed-in requester".into(),
            ));
        };
        if requester.org_id != org_id {
            return Err(ContactPointError::PermissionDenied(format!(
                "'{}' does not act in organization {}",
                requester.login, org_id
            )));
        }
        if !self
            .access_control
            .has_permission(requester, ACTION_PROVISIONING_READ_SECRETS)
            .await?
        {
            warn!(login = %requester.login, %org_id, "Denied request to decrypt secure settings");
            return Err(ContactPointError::PermissionDenied(format!(
                "'{}' lacks '{}'",
                requester.login, ACTION_PROVISIONING_READ_SECRETS
            )));
        }
        Ok(())
    }

    /// Tags incoming settings against `schema`, encrypting secure fields, and
    /// carries over stored fields the caller did not replace that are still secure
    /// for `schema`.
    async fn merge_settings(
        &self,
        schema: &NotifierSchema,
        incoming: Map<String, Value>,
        existing: &Settings,
    ) -> Result<Settings, ContactPointError> {
        let cipher = SettingsCipher::new(self.encryption.as_ref());
        let mut merged = Settings::new();
        for (field, value) in incoming {
            if !schema.is_secure(&field) {
                merged.insert(field, Setting::Plain(value));
                continue;
            }
            match value {
                Value::Null => {}
                Value::String(s) if s == REDACTED_VALUE => {}
                Value::String(s) => {
                    merged.insert(field, Setting::Secure(cipher.seal(&s).await?));
                }
                _ => {
                    return Err(ContactPointError::validation(format!(
                        "secure setting '{}' must be a string",
                        field
                    )))
                }
            }
        }
        for (field, setting) in existing.iter() {
            if let Setting::Secure(sealed) = setting {
                if schema.is_secure(field) && merged.get(field).is_none() {
                    merged.insert(field.clone(), Setting::Secure(sealed.clone()));
                }
            }
        }
        Ok(merged)
    }

    async fn render(
        &self,
        name: &str,
        entry: &ReceiverEntry,
        provenance: Provenance,
        decrypt: bool,
    ) -> Result<ContactPoint, ContactPointError> {
        if !decrypt {
            return Ok(redacted_view(name, entry, provenance));
        }
        let settings = SettingsCipher::new(self.encryption.as_ref())
            .reveal(&entry.settings)
            .await?;
        Ok(view(name, entry, provenance, settings))
    }

    async fn persist(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        token: &ConcurrencyToken,
        change: ProvenanceChange<'_>,
    ) -> Result<(), ContactPointError> {
        let unit = self.xact.begin().await?;
        match self.apply(org_id, config, token, change).await {
            Ok(()) => {
                unit.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = unit.rollback().await {
                    warn!(error = %rollback, "Rollback failed after write error");
                }
                if matches!(e, ContactPointError::ConcurrencyConflict) {
                    metrics::counter!("contact_point_conflicts_total").increment(1);
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        org_id: OrgId,
        config: &AlertingConfig,
        token: &ConcurrencyToken,
        change: ProvenanceChange<'_>,
    ) -> Result<(), ContactPointError> {
        // An unchanged document is saved too, so the token is checked.
        self.config_store.save(org_id, config, token).await?;
        match change {
            ProvenanceChange::Set(uid, provenance) => {
                self.provenance_store.set(org_id, uid, provenance).await?
            }
            ProvenanceChange::Delete(uid) => self.provenance_store.delete(org_id, uid).await?,
        }
        Ok(())
    }
}

fn unused_uid(config: &AlertingConfig) -> String {
    loop {
        let uid = generate_uid();
        if config.find_receiver(&uid).is_none() {
            return uid;
        }
    }
}

fn redacted_view(name: &str, entry: &ReceiverEntry, provenance: Provenance) -> ContactPoint {
    view(name, entry, provenance, entry.settings.redacted())
}

fn view(
    name: &str,
    entry: &ReceiverEntry,
    provenance: Provenance,
    settings: Map<String, Value>,
) -> ContactPoint {
    ContactPoint {
        uid: entry.uid.clone(),
        name: name.to_string(),
        kind: entry.kind.clone(),
        disable_resolve_message: entry.disable_resolve_message,
        settings: Some(settings),
        provenance,
    }
}
