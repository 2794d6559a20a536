//! # mnemo-core
//!
//! Core types and error definitions shared by every Mnemo crate: identifiers,
//! review statuses, source references, and promotion thresholds.

pub mod error;
pub mod types;

pub use error::{MnemoError, Result};
pub use types::*;
