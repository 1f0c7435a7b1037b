//! contactpoints - contact point provisioning for an alerting configuration
//!
//! This library manages the receiver entries ("contact points") of a
//! per-organization alerting configuration document: it validates them,
//! encrypts their secure settings, stitches them into the receiver groups,
//! and persists the document and each entry's provenance atomically under
//! optimistic concurrency control.

pub mod access_control;
pub mod app;
pub mod cli;
pub mod config;
pub mod contact_points;
pub mod core;
pub mod encryption;
pub mod provenance;
pub mod secrets;
pub mod stitching;
pub mod store;

// Re-export core types for convenience
pub use crate::core::*;
pub use contact_points::{ContactPointError, ContactPointService};
pub use provenance::Provenance;
