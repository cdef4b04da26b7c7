//! Consistency rules for build descriptors
//!
//! Errors make the descriptor unusable; warnings are surfaced to the user but
//! the descriptor still loads (unless the caller asks for strictness).

use crate::descriptor::{DependencyKind, VersionConstraint};
use crate::loader::Draft;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tasksync_core::config::ValidationConfig;
use tasksync_core::validation::{ValidationIssue, ValidationResult, Validator};

pub const ANDROID_APPLICATION_PLUGIN: &str = "com.android.application";
pub const FLUTTER_PLUGIN: &str = "dev.flutter.flutter-gradle-plugin";

const ANDROID_PLUGINS: &[&str] = &[ANDROID_APPLICATION_PLUGIN, "com.android.library"];
const KOTLIN_PLUGINS: &[&str] = &["kotlin-android", "org.jetbrains.kotlin.android"];

/// Highest `versionCode` Google Play accepts
const MAX_VERSION_CODE: u32 = 2_100_000_000;

const KNOWN_CONFIGURATIONS: &[&str] = &[
    "implementation",
    "api",
    "compileOnly",
    "runtimeOnly",
    "annotationProcessor",
    "kapt",
    "ksp",
    "lintChecks",
    "coreLibraryDesugaring",
    "testImplementation",
    "testCompileOnly",
    "testRuntimeOnly",
    "androidTestImplementation",
    "androidTestCompileOnly",
    "androidTestRuntimeOnly",
];

static PACKAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").unwrap());

static VARIANT_CONFIGURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][A-Za-z0-9]*(Implementation|Api|CompileOnly|RuntimeOnly)$").unwrap()
});

static COORDINATE_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

static VERSION_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+\-\[\]()!,]+$").unwrap());

/// Split `group:artifact[:version[:classifier]][@ext]` into name and version
pub(crate) fn parse_coordinate(notation: &str) -> Option<(String, Option<String>)> {
    let (coordinate, extension) = match notation.split_once('@') {
        Some((c, ext)) => (c, Some(ext)),
        None => (notation, None),
    };
    if extension.is_some_and(|ext| !COORDINATE_PART.is_match(ext)) {
        return None;
    }

    let parts: Vec<&str> = coordinate.split(':').collect();
    let (group, artifact) = match parts.as_slice() {
        [group, artifact, ..] if parts.len() <= 4 => (*group, *artifact),
        _ => return None,
    };
    if !COORDINATE_PART.is_match(group) || !COORDINATE_PART.is_match(artifact) {
        return None;
    }

    let version = match parts.get(2) {
        Some(v) if VERSION_PART.is_match(v) => Some((*v).to_string()),
        Some(_) => return None,
        None => None,
    };
    if parts.get(3).is_some_and(|classifier| !COORDINATE_PART.is_match(classifier)) {
        return None;
    }

    Some((format!("{}:{}", group, artifact), version))
}

pub(crate) fn is_known_configuration(name: &str) -> bool {
    KNOWN_CONFIGURATIONS.contains(&name) || VARIANT_CONFIGURATION.is_match(name)
}

/// Check a draft descriptor against the configured rules
pub(crate) fn validate(draft: &Draft, rules: &ValidationConfig) -> ValidationResult {
    let mut result = required_fields(draft);
    result.merge(identity(draft));
    result.merge(sdk_bounds(draft, rules));
    result.merge(app_version(draft));
    result.merge(java(draft, rules));
    result.merge(plugins(draft, rules));
    result.merge(dependencies(draft, rules));
    result.merge(signing(draft));
    result
}

fn required_fields(draft: &Draft) -> ValidationResult {
    let mut result = ValidationResult::new();
    let fields = [
        ("android.defaultConfig.applicationId", draft.application_id.is_some()),
        ("android.defaultConfig.minSdk", draft.min_sdk.is_some()),
        ("android.defaultConfig.targetSdk", draft.target_sdk.is_some()),
        ("android.compileSdk", draft.compile_sdk.is_some()),
    ];
    for (field, present) in fields {
        if !present && !draft.failed.contains(field) {
            result.add_error(
                ValidationIssue::new(field, "REQUIRED", "Field is required")
                    .expected("a value")
                    .actual("not set"),
            );
        }
    }
    result
}

fn identity(draft: &Draft) -> ValidationResult {
    let mut validator = Validator::new();
    if let Some(id) = &draft.application_id {
        validator = validator.matches(
            "android.defaultConfig.applicationId",
            id,
            &PACKAGE_NAME,
            "a dotted package name such as com.example.app",
        );
    }
    if let Some(namespace) = &draft.namespace {
        validator = validator.matches(
            "android.namespace",
            namespace,
            &PACKAGE_NAME,
            "a dotted package name such as com.example.app",
        );
    }
    validator.validate()
}

fn sdk_bounds(draft: &Draft, rules: &ValidationConfig) -> ValidationResult {
    let mut validator = Validator::new();
    let min = draft.min_sdk;
    let target = draft.target_sdk;
    let compile = draft.compile_sdk;

    if let Some(min) = min {
        validator = validator.range("android.defaultConfig.minSdk", min, 1, rules.max_sdk);
    }
    if let Some(compile) = compile {
        validator = validator.range("android.compileSdk", compile, 1, rules.max_sdk);
    }
    if let (Some(min), Some(target)) = (min, target) {
        validator = validator.ordered(
            "android.defaultConfig.minSdk",
            min,
            "android.defaultConfig.targetSdk",
            target,
        );
    }
    if let (Some(target), Some(compile)) = (target, compile) {
        validator = validator.ordered(
            "android.defaultConfig.targetSdk",
            target,
            "android.compileSdk",
            compile,
        );
    }
    validator.validate()
}

fn app_version(draft: &Draft) -> ValidationResult {
    let mut validator = Validator::new();
    if let Some(code) = draft.version_code {
        validator = validator.range("android.defaultConfig.versionCode", code, 1, MAX_VERSION_CODE);
    }
    if let Some(name) = &draft.version_name {
        validator = validator.required("android.defaultConfig.versionName", name);
    }
    validator.validate()
}

fn java(draft: &Draft, rules: &ValidationConfig) -> ValidationResult {
    let options = draft.compile_options();
    let supported = &rules.supported_java_versions;

    let mut validator = Validator::new()
        .one_of(
            "android.compileOptions.sourceCompatibility",
            &options.source_compat.feature(),
            supported,
        )
        .one_of(
            "android.compileOptions.targetCompatibility",
            &options.target_compat.feature(),
            supported,
        )
        .ordered(
            "android.compileOptions.sourceCompatibility",
            options.source_compat,
            "android.compileOptions.targetCompatibility",
            options.target_compat,
        );

    if let Some(jvm_target) = draft.jvm_target {
        validator = validator.warn_if(
            "android.kotlinOptions.jvmTarget",
            jvm_target != options.target_compat,
            &format!(
                "jvmTarget {} differs from targetCompatibility {}",
                jvm_target, options.target_compat
            ),
        );
    }

    let has_desugar_lib = draft
        .dependencies
        .iter()
        .any(|d| d.configuration == "coreLibraryDesugaring");
    validator
        .custom("android.compileOptions.isCoreLibraryDesugaringEnabled", || {
            (options.desugaring && !has_desugar_lib).then(|| {
                "Desugaring is enabled but no coreLibraryDesugaring dependency is declared".to_string()
            })
        })
        .warn_if(
            "dependencies",
            has_desugar_lib && !options.desugaring,
            "A coreLibraryDesugaring dependency is declared but desugaring is not enabled",
        )
        .validate()
}

fn plugins(draft: &Draft, rules: &ValidationConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    let position = |ids: &[&str]| draft.plugins.iter().rposition(|p| ids.contains(&p.as_str()));

    if rules.require_application_plugin && position(&[ANDROID_APPLICATION_PLUGIN][..]).is_none() {
        result.add_error(
            ValidationIssue::new(
                "plugins",
                "MISSING_PLUGIN",
                format!("The {} plugin is not applied", ANDROID_APPLICATION_PLUGIN),
            )
            .expected(ANDROID_APPLICATION_PLUGIN),
        );
    }

    if let Some(flutter) = draft.plugins.iter().position(|p| p == FLUTTER_PLUGIN) {
        for (group, ids) in [("Android", ANDROID_PLUGINS), ("Kotlin", KOTLIN_PLUGINS)] {
            if let Some(last) = position(ids) {
                if last > flutter {
                    result.add_error(
                        ValidationIssue::new(
                            format!("plugins[{}]", flutter),
                            "PLUGIN_ORDER",
                            format!(
                                "The Flutter Gradle plugin must be applied after the {} plugin `{}`",
                                group, draft.plugins[last]
                            ),
                        ),
                    );
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for (index, plugin) in draft.plugins.iter().enumerate() {
        if !seen.insert(plugin.as_str()) {
            result.add_warning(ValidationIssue::new(
                format!("plugins[{}]", index),
                "DUPLICATE_PLUGIN",
                format!("Plugin `{}` is applied more than once", plugin),
            ));
        }
    }

    result
}

fn dependencies(draft: &Draft, rules: &ValidationConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut seen = HashSet::new();

    for (index, dep) in draft.dependencies.iter().enumerate() {
        let field = draft.dependency_field(index);

        if !is_known_configuration(&dep.configuration) {
            result.add_error(
                ValidationIssue::new(
                    field.as_str(),
                    "UNKNOWN_CONFIGURATION",
                    format!("Unknown dependency configuration `{}`", dep.configuration),
                )
                .actual(dep.configuration.as_str()),
            );
        }

        if let Some(group) = dep.group() {
            if !rules.allowed_groups.is_empty() && !rules.allowed_groups.iter().any(|g| g == group) {
                result.add_error(
                    ValidationIssue::new(
                        field.as_str(),
                        "UNKNOWN_DEPENDENCY",
                        format!("Dependency `{}` is not from an allowed group", dep.name),
                    )
                    .expected(rules.allowed_groups.join(", "))
                    .actual(group),
                );
            }
        }

        if dep.version_constraint.is_unmanaged() && dep.kind == DependencyKind::Module {
            result.add_error(ValidationIssue::new(
                field.as_str(),
                "UNMANAGED_VERSION",
                format!(
                    "`{}` has no version and no platform (BoM) supplies one",
                    dep.name
                ),
            ));
        }

        if !seen.insert((dep.configuration.as_str(), dep.name.as_str(), dep.kind)) {
            result.add_warning(ValidationIssue::new(
                field.as_str(),
                "DUPLICATE_DEPENDENCY",
                format!("`{}` is declared more than once in {}", dep.name, dep.configuration),
            ));
        }

        if let VersionConstraint::Declared(version) = &dep.version_constraint {
            if version.ends_with('+') || version == "latest.release" {
                result.add_warning(ValidationIssue::new(
                    field.as_str(),
                    "DYNAMIC_VERSION",
                    format!("`{}` uses a dynamic version `{}`", dep.name, version),
                ));
            }
        }
    }

    result
}

fn signing(draft: &Draft) -> ValidationResult {
    let mut result = ValidationResult::new();

    for build_type in &draft.build_types {
        let Some(signing) = &build_type.signing_config else {
            continue;
        };
        let field = format!("android.buildTypes.{}.signingConfig", build_type.name);

        if signing.name() != "debug" && !draft.signing_configs.iter().any(|s| s == signing.name()) {
            result.add_warning(ValidationIssue::new(
                field.as_str(),
                "UNDECLARED_SIGNING_CONFIG",
                format!("Signing config `{}` is not declared in signingConfigs", signing),
            ));
        }
        if build_type.name == "release" && signing.name() == "debug" {
            result.add_warning(ValidationIssue::new(
                field.as_str(),
                "DEBUG_SIGNED_RELEASE",
                "The release build type is signed with the debug key",
            ));
        }
    }

    result
}
