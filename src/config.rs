//! Configuration management.
//!
//! Settings are layered with `figment`: built-in defaults, then a TOML file
//! (`contactpoints.toml` unless `--config` names another), then
//! `CONTACTPOINTS_`-prefixed environment variables, then command-line flags.
//! Nested keys are addressed in the environment with a double underscore,
//! e.g. `CONTACTPOINTS_STORAGE__DATA_DIR`.

use crate::cli::Cli;
use crate::core::OrgId;
use crate::secrets::{NotifierRegistry, NotifierSchema};
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "contactpoints.toml";

/// Key used when none is configured. Only fit for local development.
pub const DEV_SECRET_KEY: &str = "contactpoints-development-key";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, or any `EnvFilter` directive.
    pub log_level: String,
    /// Organization the command-line tool acts in.
    pub org_id: OrgId,
    pub storage: StorageConfig,
    pub encryption: EncryptionConfig,
    /// Extra notifier kinds, or overrides of built-in ones.
    #[serde(default)]
    pub notifiers: Vec<NotifierSchema>,
}

/// Where the file stores keep their documents.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Encryption of secure settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EncryptionConfig {
    /// Secret the AES-256-GCM key is derived from.
    pub secret_key: String,
}

impl Config {
    /// Loads the configuration, layering defaults, the TOML file, the
    /// environment and the command-line flags in that order.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = match &cli.config {
            Some(path) if !path.exists() => {
                bail!("configuration file {} does not exist", path.display())
            }
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONTACTPOINTS_").split("__"))
            .merge(cli.clone())
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make the stores or the cipher unusable.
    pub fn validate(&self) -> Result<()> {
        if self.encryption.secret_key.is_empty() {
            bail!("encryption.secret_key must not be empty");
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            bail!("storage.data_dir must not be empty");
        }
        if let Some(schema) = self.notifiers.iter().find(|s| s.kind.is_empty()) {
            bail!(
                "notifier schema with secure fields {:?} has no kind",
                schema.secure_fields
            );
        }
        Ok(())
    }

    /// The built-in notifier registry extended with the configured schemas.
    pub fn notifier_registry(&self) -> NotifierRegistry {
        NotifierRegistry::builtin().with_schemas(self.notifiers.iter().cloned())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.encryption.secret_key == DEV_SECRET_KEY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            org_id: OrgId(1),
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
            },
            encryption: EncryptionConfig {
                secret_key: DEV_SECRET_KEY.to_string(),
            },
            notifiers: Vec::new(),
        }
    }
}
