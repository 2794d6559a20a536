//! # mnemo-cli
//!
//! Command-line interface for Mnemo.
//!
//! ## Commands
//!
//! - `mnemo status`: Counts, thresholds, targets and the last run
//! - `mnemo observe` / `mnemo import`: Record observations
//! - `mnemo pending`, `approve`, `deny`, `skip`: Review loop
//! - `mnemo promotable`, `promote`, `reject`: Core memory promotion
//! - `mnemo doctor`: Audit configuration and stored data

pub mod commands;
pub mod writer;

pub use commands::Cli;
pub use writer::FileWriter;
