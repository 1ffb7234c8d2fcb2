//! Configuration types and loaders for skiff.
//!
//! This crate owns the on-disk manifest schema so the runtime and the binary
//! share a single source of truth.

pub mod manifest;

pub use manifest::{AppManifest, StorageSettings, TemplateSettings};
