//! Android build descriptor loading for TaskSync
//!
//! This crate reads the declarative Android build description
//! (`android/app/build.gradle.kts`) and produces an immutable
//! [`BuildDescriptor`]:
//! - a lexer and recursive-descent parser for the Kotlin build DSL subset
//! - a layered [`BuildContext`] resolving `flutter.*` and other external constants
//! - consistency rules collected into a single [`ValidationError`]
//! - Gradle hand-off for building a validated project
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tasksync_android::DescriptorLoader;
//!
//! let loader = DescriptorLoader::default();
//! let descriptor = loader.load_file(Path::new("android/app/build.gradle.kts"))?;
//! println!("{} targets API {}", descriptor.application_id(), descriptor.sdk().target);
//! # Ok::<(), tasksync_android::LoadError>(())
//! ```

pub mod context;
pub mod descriptor;
pub mod error;
pub mod gradle;
pub mod lexer;
pub mod loader;
pub mod parser;
mod rules;
pub mod syntax;

pub use context::{parse_override, BuildContext, ContextSource, ContextValue};
pub use descriptor::{
    AppVersion, BuildDescriptor, BuildType, CompileOptions, Dependency, DependencyKind,
    JavaVersion, SdkVersions, SigningConfigRef, VersionConstraint,
};
pub use error::{LoadError, Location, ParseError, ValidationError};
pub use loader::DescriptorLoader;
pub use rules::{ANDROID_APPLICATION_PLUGIN, FLUTTER_PLUGIN};
