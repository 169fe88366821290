//! Payload handling module.
//!
//! Provides parsing and patching of the device config, fragmenting of the
//! serialized result and reading of network scans.

pub mod config;
pub mod plan;
pub mod scan;

pub use config::{ConfigDocument, ConfigEdit, PatchError, patch};
pub use plan::{FragmentIter, WritePlan};
