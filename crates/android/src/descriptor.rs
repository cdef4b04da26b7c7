//! The loaded build descriptor
//!
//! A [`BuildDescriptor`] is produced once by [`crate::DescriptorLoader`] and
//! never modified afterwards; it only exposes read accessors.

use serde::{Serialize, Serializer};
use std::fmt;

/// Java language level, as named by Gradle's `JavaVersion` enum
///
/// Holds the feature release number: `VERSION_1_8` is 8, `VERSION_17` is 17.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JavaVersion(u8);

impl JavaVersion {
    pub const VERSION_1_8: JavaVersion = JavaVersion(8);
    pub const VERSION_11: JavaVersion = JavaVersion(11);
    pub const VERSION_17: JavaVersion = JavaVersion(17);
    pub const VERSION_21: JavaVersion = JavaVersion(21);

    /// Highest release the platform enum names
    const LATEST: u8 = 24;

    /// Look up an enum constant name such as `VERSION_1_8` or `VERSION_17`
    pub fn from_constant(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("VERSION_")?;
        let feature: u8 = match rest.strip_prefix("1_") {
            Some(legacy) => legacy.parse().ok().filter(|v| (1..=10).contains(v))?,
            None => rest.parse().ok().filter(|v| (11..=Self::LATEST).contains(v))?,
        };
        Some(Self(feature))
    }

    /// Parse a version string such as `"1.8"`, `"8"` or `"17"`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let feature: u8 = match s.strip_prefix("1.") {
            Some(legacy) => legacy.parse().ok().filter(|v| (1..=10).contains(v))?,
            None => s.parse().ok().filter(|v| (1..=Self::LATEST).contains(v))?,
        };
        Some(Self(feature))
    }

    /// Feature release number
    pub fn feature(self) -> u8 {
        self.0
    }

    /// Enum constant name, e.g. `VERSION_1_8`
    pub fn constant_name(self) -> String {
        if self.0 <= 10 {
            format!("VERSION_1_{}", self.0)
        } else {
            format!("VERSION_{}", self.0)
        }
    }
}

impl fmt::Display for JavaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 10 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for JavaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// API level bounds; always `min <= target <= compile` once loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SdkVersions {
    pub min: u32,
    pub target: u32,
    pub compile: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub source_compat: JavaVersion,
    pub target_compat: JavaVersion,
    pub desugaring: bool,
}

impl Default for CompileOptions {
    /// Gradle's defaults when the block is absent
    fn default() -> Self {
        Self {
            source_compat: JavaVersion::VERSION_1_8,
            target_compat: JavaVersion::VERSION_1_8,
            desugaring: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppVersion {
    pub code: Option<u32>,
    pub name: Option<String>,
}

/// Weak reference to a named signing profile, resolved by the build tool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SigningConfigRef(pub(crate) String);

impl SigningConfigRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SigningConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildType {
    pub name: String,
    pub signing_config: Option<SigningConfigRef>,
    pub minify_enabled: bool,
    pub shrink_resources: bool,
}

impl BuildType {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_config: None,
            minify_enabled: false,
            shrink_resources: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A Maven module `group:artifact[:version]`
    Module,
    /// A BoM supplying versions to other modules
    Platform,
    /// Another project of the same build, `project(":core")`
    Project,
}

/// Where a dependency's version comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VersionConstraint {
    /// Written in the coordinate
    Declared(String),
    /// Supplied by the named platform (BoM)
    Managed(String),
    /// Built from another project of the same build
    Local,
    /// Nothing supplies a version
    Unmanaged,
}

impl VersionConstraint {
    pub fn is_unmanaged(&self) -> bool {
        matches!(self, VersionConstraint::Unmanaged)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Declared(v) => f.write_str(v),
            VersionConstraint::Managed(platform) => write!(f, "managed by {}", platform),
            VersionConstraint::Local => f.write_str("local project"),
            VersionConstraint::Unmanaged => f.write_str("unspecified"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Gradle configuration, e.g. `implementation`
    pub configuration: String,
    /// `group:artifact` for modules and platforms, the project path for projects
    pub name: String,
    pub version_constraint: VersionConstraint,
    pub kind: DependencyKind,
}

impl Dependency {
    /// Maven group, for modules and platforms
    pub fn group(&self) -> Option<&str> {
        match self.kind {
            DependencyKind::Project => None,
            _ => self.name.split(':').next(),
        }
    }

    /// Notation as it would be written in the build file
    pub fn notation(&self) -> String {
        let base = match &self.version_constraint {
            VersionConstraint::Declared(v) => format!("{}:{}", self.name, v),
            _ => self.name.clone(),
        };
        match self.kind {
            DependencyKind::Module => base,
            DependencyKind::Platform => format!("platform({})", base),
            DependencyKind::Project => format!("project({})", base),
        }
    }
}

/// The immutable result of loading a build descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub(crate) application_id: String,
    pub(crate) namespace: Option<String>,
    pub(crate) plugins: Vec<String>,
    pub(crate) sdk: SdkVersions,
    pub(crate) ndk_version: Option<String>,
    pub(crate) version: AppVersion,
    pub(crate) compile_options: CompileOptions,
    pub(crate) jvm_target: Option<JavaVersion>,
    pub(crate) build_types: Vec<BuildType>,
    pub(crate) signing_configs: Vec<String>,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) flutter_source: Option<String>,
}

impl BuildDescriptor {
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Plugin ids in the order they are applied
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.iter().any(|p| p == id)
    }

    pub fn sdk(&self) -> SdkVersions {
        self.sdk
    }

    pub fn ndk_version(&self) -> Option<&str> {
        self.ndk_version.as_deref()
    }

    pub fn version(&self) -> &AppVersion {
        &self.version
    }

    pub fn compile_options(&self) -> &CompileOptions {
        &self.compile_options
    }

    /// Kotlin `jvmTarget`, when set
    pub fn jvm_target(&self) -> Option<JavaVersion> {
        self.jvm_target
    }

    pub fn build_types(&self) -> &[BuildType] {
        &self.build_types
    }

    pub fn build_type(&self, name: &str) -> Option<&BuildType> {
        self.build_types.iter().find(|b| b.name == name)
    }

    /// Signing profile used by the release build type
    pub fn signing_config(&self) -> Option<&SigningConfigRef> {
        self.build_type("release")
            .and_then(|b| b.signing_config.as_ref())
    }

    /// Signing profiles declared in `signingConfigs { }`
    pub fn signing_configs(&self) -> &[String] {
        &self.signing_configs
    }

    /// Dependencies in declaration order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn flutter_source(&self) -> Option<&str> {
        self.flutter_source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_version_constants() {
        assert_eq!(JavaVersion::from_constant("VERSION_17"), Some(JavaVersion::VERSION_17));
        assert_eq!(JavaVersion::from_constant("VERSION_1_8"), Some(JavaVersion::VERSION_1_8));
        assert_eq!(JavaVersion::from_constant("VERSION_1_11"), None);
        assert_eq!(JavaVersion::from_constant("VERSION_8"), None);
        assert_eq!(JavaVersion::from_constant("VERSION_99"), None);
        assert_eq!(JavaVersion::from_constant("HIGHER"), None);
    }

    #[test]
    fn test_java_version_parse_and_display() {
        assert_eq!(JavaVersion::parse("1.8"), Some(JavaVersion::VERSION_1_8));
        assert_eq!(JavaVersion::parse("8"), Some(JavaVersion::VERSION_1_8));
        assert_eq!(JavaVersion::parse("17"), Some(JavaVersion::VERSION_17));
        assert_eq!(JavaVersion::parse("seventeen"), None);
        assert_eq!(JavaVersion::VERSION_1_8.to_string(), "1.8");
        assert_eq!(JavaVersion::VERSION_21.to_string(), "21");
        assert_eq!(JavaVersion::VERSION_1_8.constant_name(), "VERSION_1_8");
        assert!(JavaVersion::VERSION_11 < JavaVersion::VERSION_17);
    }

    #[test]
    fn test_dependency_notation() {
        let bom = Dependency {
            configuration: "implementation".into(),
            name: "com.google.firebase:firebase-bom".into(),
            version_constraint: VersionConstraint::Declared("34.3.0".into()),
            kind: DependencyKind::Platform,
        };
        assert_eq!(bom.notation(), "platform(com.google.firebase:firebase-bom:34.3.0)");
        assert_eq!(bom.group(), Some("com.google.firebase"));

        let auth = Dependency {
            configuration: "implementation".into(),
            name: "com.google.firebase:firebase-auth".into(),
            version_constraint: VersionConstraint::Managed("com.google.firebase:firebase-bom".into()),
            kind: DependencyKind::Module,
        };
        assert_eq!(auth.notation(), "com.google.firebase:firebase-auth");
        assert_eq!(
            auth.version_constraint.to_string(),
            "managed by com.google.firebase:firebase-bom"
        );
    }

    #[test]
    fn test_dependency_json_shape() {
        let core = Dependency {
            configuration: "implementation".into(),
            name: ":core".into(),
            version_constraint: VersionConstraint::Local,
            kind: DependencyKind::Project,
        };
        let json = serde_json::to_value(&core).unwrap();
        assert_eq!(json["versionConstraint"]["type"], "local");
        assert_eq!(json["kind"], "project");

        let options = serde_json::to_value(CompileOptions::default()).unwrap();
        assert_eq!(options["sourceCompat"], "1.8");
        assert_eq!(options["desugaring"], false);
    }
}
