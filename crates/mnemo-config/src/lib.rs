//! # mnemo-config
//!
//! Configuration for Mnemo. Reads `mnemo.toml`, then applies `MNEMO_*`
//! environment overrides, then validates. CLI flags take precedence over both
//! and are applied by the caller.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    ConfigWarning, LoggingConfig, MnemoConfig, StorageConfig, TargetConfig, WarningSeverity,
    expand_tilde,
};
