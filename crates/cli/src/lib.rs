//! CLI utilities for TaskSync build tools
//!
//! Provides shared CLI functionality:
//! - Status messages that honour `--no-color`
//! - Rendering of validation issues and errors

#![warn(missing_docs)]

pub mod output;
