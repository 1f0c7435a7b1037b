//! Command-Line Interface (CLI) argument parsing.
//!
//! Global flags are merged over `contactpoints.toml` and the environment by
//! `Config::load`. The subcommand selects the contact point operation.

use crate::provenance::Provenance;
use clap::{Args, Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Manage alerting contact points.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the alerting documents and provenance records.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Organization to act in.
    #[arg(long, value_name = "ID")]
    pub org_id: Option<i64>,

    /// Logging level, e.g. "debug".
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List contact points.
    List {
        /// Only list contact points with this name.
        #[arg(long)]
        name: Option<String>,
        /// Show secure settings in cleartext.
        #[arg(long)]
        decrypt: bool,
    },
    /// Show one contact point.
    Get {
        uid: String,
        #[arg(long)]
        decrypt: bool,
    },
    /// Create a contact point.
    Create {
        /// Use this uid instead of generating one.
        #[arg(long)]
        uid: Option<String>,
        #[command(flatten)]
        contact_point: ContactPointArgs,
    },
    /// Replace the contact point with the given uid.
    Update {
        uid: String,
        #[command(flatten)]
        contact_point: ContactPointArgs,
    },
    /// Delete a contact point.
    Delete { uid: String },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ContactPointArgs {
    #[arg(long)]
    pub name: String,

    /// Notifier kind, e.g. "slack".
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,

    /// Settings as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub settings: String,

    #[arg(long)]
    pub disable_resolve_message: bool,

    /// Origin recorded for the contact point: "api" or "file".
    #[arg(long, default_value = "api")]
    pub provenance: Provenance,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(org_id) = self.org_id {
            dict.insert("org_id".into(), Value::from(org_id));
        }

        if let Some(dir) = &self.data_dir {
            let mut storage = Dict::new();
            storage.insert("data_dir".into(), Value::from(dir.display().to_string()));
            dict.insert("storage".into(), Value::from(storage));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
