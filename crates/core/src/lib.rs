//! Core utilities for TaskSync build tooling
//!
//! This crate provides shared functionality used by the Android tools:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based tool configuration with defaults
//! - **Validation**: a fluent validator that collects every issue
//! - **Process execution**: running the external build tool
//!
//! # Example
//!
//! ```rust,no_run
//! use tasksync_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("descriptor: {}", config.schema.general.descriptor_path().display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod process;
pub mod validation;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::validation::{ValidationIssue, ValidationResult, Validator};
}
