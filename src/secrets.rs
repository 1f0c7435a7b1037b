//! Secure settings handling.
//!
//! Receiver settings are an open map, but some of its fields hold secrets
//! (webhook URLs, API tokens). Every field is tagged as either `Plain` or
//! `Secure` when it enters the system, using the `NotifierRegistry` to learn
//! which fields of a notifier kind are secret. Redaction and encryption then
//! work on the tags alone and never need to know about individual notifiers.

use crate::core::EncryptionService;
use crate::encryption::EncryptionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Placeholder returned in place of a secure value.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Which settings of a notifier kind are secret, and which must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierSchema {
    /// Notifier kind, e.g. "slack".
    pub kind: String,
    #[serde(default)]
    pub secure_fields: Vec<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl NotifierSchema {
    pub fn new(kind: &str, secure_fields: &[&str], required_fields: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            secure_fields: secure_fields.iter().map(|f| f.to_string()).collect(),
            required_fields: required_fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn is_secure(&self, field: &str) -> bool {
        self.secure_fields.iter().any(|f| f == field)
    }
}

/// Lookup of notifier schemas by kind.
///
/// Kinds without a registered schema have no secure and no required fields.
#[derive(Debug, Clone)]
pub struct NotifierRegistry {
    schemas: HashMap<String, NotifierSchema>,
    fallback: NotifierSchema,
}

impl NotifierRegistry {
    /// The registry of built-in notifier kinds.
    pub fn builtin() -> Self {
        let schemas = [
            NotifierSchema::new("slack", &["url", "token"], &[]),
            NotifierSchema::new("email", &[], &["addresses"]),
            NotifierSchema::new(
                "webhook",
                &["password", "authorization_credentials"],
                &["url"],
            ),
            NotifierSchema::new("pagerduty", &["integrationKey"], &["integrationKey"]),
            NotifierSchema::new("opsgenie", &["apiKey"], &["apiKey"]),
            NotifierSchema::new("teams", &[], &["url"]),
            NotifierSchema::new("discord", &["url"], &["url"]),
            NotifierSchema::new("telegram", &["bottoken"], &["bottoken", "chatid"]),
        ];
        Self::empty().with_schemas(schemas)
    }

    /// A registry that knows no notifier kinds.
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
            fallback: NotifierSchema::default(),
        }
    }

    /// Adds schemas, replacing any already registered for the same kind.
    pub fn with_schemas(mut self, schemas: impl IntoIterator<Item = NotifierSchema>) -> Self {
        for schema in schemas {
            self.schemas.insert(schema.kind.clone(), schema);
        }
        self
    }

    pub fn schema(&self, kind: &str) -> &NotifierSchema {
        self.schemas.get(kind).unwrap_or(&self.fallback)
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// An encrypted secret, base64 of the encryption service's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedValue(String);

impl EncryptedValue {
    pub fn from_ciphertext(ciphertext: &[u8]) -> Self {
        Self(base64::encode(ciphertext))
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>, EncryptionError> {
        base64::decode(&self.0).map_err(|e| EncryptionError::Malformed(e.to_string()))
    }
}

/// A single settings field, tagged with its capability.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Plain(Value),
    Secure(EncryptedValue),
}

/// The settings of a receiver entry at rest.
///
/// Stored as two maps, `settings` for plain fields and `secure_settings` for
/// encrypted ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSettings", into = "WireSettings")]
pub struct Settings(BTreeMap<String, Setting>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, setting: Setting) -> Option<Setting> {
        self.0.insert(field.into(), setting)
    }

    pub fn get(&self, field: &str) -> Option<&Setting> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Setting)> {
        self.0.iter()
    }

    /// The caller-facing view with every secure field replaced by `REDACTED_VALUE`.
    pub fn redacted(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(field, setting)| {
                let value = match setting {
                    Setting::Plain(value) => value.clone(),
                    Setting::Secure(_) => Value::String(REDACTED_VALUE.to_string()),
                };
                (field.clone(), value)
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct WireSettings {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    secure_settings: BTreeMap<String, EncryptedValue>,
}

impl From<WireSettings> for Settings {
    fn from(wire: WireSettings) -> Self {
        let mut fields: BTreeMap<String, Setting> = wire
            .settings
            .into_iter()
            .map(|(field, value)| (field, Setting::Plain(value)))
            .collect();
        // A field present in both maps is secret.
        for (field, value) in wire.secure_settings {
            fields.insert(field, Setting::Secure(value));
        }
        Self(fields)
    }
}

impl From<Settings> for WireSettings {
    fn from(settings: Settings) -> Self {
        let mut wire = WireSettings {
            settings: Map::new(),
            secure_settings: BTreeMap::new(),
        };
        for (field, setting) in settings.0 {
            match setting {
                Setting::Plain(value) => {
                    wire.settings.insert(field, value);
                }
                Setting::Secure(value) => {
                    wire.secure_settings.insert(field, value);
                }
            }
        }
        wire
    }
}

/// Seals and opens secure settings through an `EncryptionService`.
pub struct SettingsCipher<'a> {
    encryption: &'a dyn EncryptionService,
}

impl<'a> SettingsCipher<'a> {
    pub fn new(encryption: &'a dyn EncryptionService) -> Self {
        Self { encryption }
    }

    pub async fn seal(&self, cleartext: &str) -> Result<EncryptedValue, EncryptionError> {
        let ciphertext = self.encryption.encrypt(cleartext.as_bytes()).await?;
        Ok(EncryptedValue::from_ciphertext(&ciphertext))
    }

    pub async fn open(&self, value: &EncryptedValue) -> Result<String, EncryptionError> {
        let cleartext = self.encryption.decrypt(&value.ciphertext()?).await?;
        String::from_utf8(cleartext).map_err(|e| EncryptionError::Malformed(e.to_string()))
    }

    /// The caller-facing view with every secure field decrypted.
    pub async fn reveal(&self, settings: &Settings) -> Result<Map<String, Value>, EncryptionError> {
        let mut revealed = Map::new();
        for (field, setting) in settings.iter() {
            let value = match setting {
                Setting::Plain(value) => value.clone(),
                Setting::Secure(secret) => Value::String(self.open(secret).await?),
            };
            revealed.insert(field.clone(), value);
        }
        Ok(revealed)
    }
}
