//! Tool configuration loading and schema definitions
//!
//! The `.tasksync-build.toml` file tells the tools where the Android project
//! lives, which values to assume for externally supplied build constants and
//! how strict descriptor validation should be.

mod loader;
mod schema;

pub use loader::{Config, CONFIG_CANDIDATES};
pub use schema::*;
