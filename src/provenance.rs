//! Provenance of a contact point: which authority may manage it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The authority that manages a contact point.
///
/// A contact point starts as `None`. Once it is claimed by the API or by file
/// provisioning, that claim is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Provenance {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "file")]
    File,
}

impl Provenance {
    pub const ALL: [Provenance; 3] = [Provenance::None, Provenance::Api, Provenance::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::None => "none",
            Provenance::Api => "api",
            Provenance::File => "file",
        }
    }

    /// Transition table for updates, current (`self`) to requested (`to`).
    ///
    /// | from \ to | None | Api | File |
    /// |-----------|------|-----|------|
    /// | None      | no   | yes | yes  |
    /// | Api       | no   | no  | no   |
    /// | File      | no   | no  | no   |
    pub fn can_transition_to(self, to: Provenance) -> bool {
        matches!(
            (self, to),
            (Provenance::None, Provenance::Api) | (Provenance::None, Provenance::File)
        )
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown provenance '{0}', expected one of: none, api, file")]
pub struct ParseProvenanceError(String);

impl FromStr for Provenance {
    type Err = ParseProvenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Provenance::None),
            "api" => Ok(Provenance::Api),
            "file" => Ok(Provenance::File),
            other => Err(ParseProvenanceError(other.to_string())),
        }
    }
}
