//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory (or an explicit `--config` path) and falls
//! back to defaults when the file does not exist yet.

pub mod config;
