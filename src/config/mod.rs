// src/config/mod.rs

//! Configuration loading and validation for wpwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate globs, destinations and server settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, HousekeepingSection, NotifySection, PathsSection, RawConfigFile, ServerSection,
    ToolsSection,
};
