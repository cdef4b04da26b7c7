//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub flutter: FlutterConfig,

    /// Extra build context entries, keyed by dotted name
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    #[serde(default)]
    pub validation: ValidationConfig,
}

/// General project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Project name
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Android project directory (holds the Gradle wrapper and `local.properties`)
    #[serde(default = "default_android_dir")]
    pub android_dir: PathBuf,

    /// Build descriptor path, relative to `android_dir`
    #[serde(default = "default_descriptor")]
    pub descriptor: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            android_dir: default_android_dir(),
            descriptor: default_descriptor(),
        }
    }
}

impl GeneralConfig {
    /// Full path of the build descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.android_dir.join(&self.descriptor)
    }

    /// Full path of `local.properties`
    pub fn local_properties_path(&self) -> PathBuf {
        self.android_dir.join("local.properties")
    }
}

fn default_project_name() -> String {
    "TaskSync".to_string()
}

fn default_android_dir() -> PathBuf {
    PathBuf::from("android")
}

fn default_descriptor() -> PathBuf {
    PathBuf::from("app/build.gradle.kts")
}

/// Defaults for the `flutter.*` constants the Flutter Gradle plugin supplies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlutterConfig {
    #[serde(default = "default_compile_sdk")]
    pub compile_sdk_version: u32,

    #[serde(default = "default_min_sdk")]
    pub min_sdk_version: u32,

    #[serde(default = "default_target_sdk")]
    pub target_sdk_version: u32,

    #[serde(default = "default_ndk_version")]
    pub ndk_version: String,

    #[serde(default = "default_version_code")]
    pub version_code: u32,

    #[serde(default = "default_version_name")]
    pub version_name: String,
}

impl Default for FlutterConfig {
    fn default() -> Self {
        Self {
            compile_sdk_version: default_compile_sdk(),
            min_sdk_version: default_min_sdk(),
            target_sdk_version: default_target_sdk(),
            ndk_version: default_ndk_version(),
            version_code: default_version_code(),
            version_name: default_version_name(),
        }
    }
}

fn default_compile_sdk() -> u32 {
    35
}

fn default_min_sdk() -> u32 {
    21
}

fn default_target_sdk() -> u32 {
    35
}

fn default_ndk_version() -> String {
    "27.0.12077973".to_string()
}

fn default_version_code() -> u32 {
    1
}

fn default_version_name() -> String {
    "1.0.0".to_string()
}

/// Descriptor validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Java feature releases accepted for source/target compatibility
    #[serde(default = "default_java_versions")]
    pub supported_java_versions: Vec<u8>,

    /// Highest API level accepted for `compileSdk`
    #[serde(default = "default_max_sdk")]
    pub max_sdk: u32,

    /// Allowed Maven groups; empty allows any group
    #[serde(default)]
    pub allowed_groups: Vec<String>,

    /// Fail when `com.android.application` is not applied
    #[serde(default = "default_true")]
    pub require_application_plugin: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            supported_java_versions: default_java_versions(),
            max_sdk: default_max_sdk(),
            allowed_groups: Vec::new(),
            require_application_plugin: true,
        }
    }
}

fn default_java_versions() -> Vec<u8> {
    vec![8, 11, 17, 21]
}

fn default_max_sdk() -> u32 {
    36
}

fn default_true() -> bool {
    true
}

/// A scalar build context value from the `[properties]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}
