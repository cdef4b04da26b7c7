//! Build Descriptor Loader
//!
//! Turns descriptor text into a [`BuildDescriptor`]:
//!
//! 1. [`crate::parser::parse`] builds a syntax tree (malformed text stops here
//!    with a [`ParseError`](crate::ParseError))
//! 2. the tree is walked, expressions are evaluated against the
//!    [`BuildContext`] and typed fields are collected into a draft
//! 3. [`crate::rules`] checks the draft; every issue is collected before
//!    failing with a [`ValidationError`]
//!
//! Loading has no side effects beyond reading the input file and is
//! deterministic for a given text and context.

use crate::context::{BuildContext, ContextValue};
use crate::descriptor::{
    AppVersion, BuildDescriptor, BuildType, CompileOptions, Dependency, DependencyKind,
    JavaVersion, SdkVersions, SigningConfigRef, VersionConstraint,
};
use crate::error::{LoadError, Location, ValidationError};
use crate::parser::parse;
use crate::rules;
use crate::syntax::{Arg, Block, Expr, ExprKind, Stmt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tasksync_core::config::{ConfigSchema, ValidationConfig};
use tasksync_core::validation::{ValidationIssue, ValidationResult};

/// How deep `val` references may chain before we give up
const MAX_VAL_DEPTH: usize = 16;

/// Block headers that name their entry with a string argument
const NAMED_CONTAINER_CALLS: &[&str] = &["create", "getByName", "named", "register", "maybeCreate"];

/// Loads and validates build descriptors
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    context: BuildContext,
    rules: ValidationConfig,
}

impl Default for DescriptorLoader {
    fn default() -> Self {
        let config = ConfigSchema::default();
        Self::new(
            BuildContext::with_flutter_defaults(&config.flutter),
            config.validation,
        )
    }
}

impl DescriptorLoader {
    pub fn new(context: BuildContext, rules: ValidationConfig) -> Self {
        Self { context, rules }
    }

    /// Loader using the layered context and rules of a tool configuration
    pub fn from_config(config: &ConfigSchema) -> Result<Self, LoadError> {
        Ok(Self::new(
            BuildContext::from_config(config)?,
            config.validation.clone(),
        ))
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut BuildContext {
        &mut self.context
    }

    /// Load descriptor text
    pub fn load_str(&self, text: &str) -> Result<BuildDescriptor, LoadError> {
        self.load_str_with_warnings(text).map(|(descriptor, _)| descriptor)
    }

    /// Load descriptor text, also returning non-fatal issues
    pub fn load_str_with_warnings(
        &self,
        text: &str,
    ) -> Result<(BuildDescriptor, Vec<ValidationIssue>), LoadError> {
        let stmts = parse(text)?;

        let mut extractor = Extractor::new(&self.context);
        extractor.file(&stmts);
        let (draft, mut result) = extractor.finish();

        result.merge(rules::validate(&draft, &self.rules));
        let (errors, warnings) = result.into_parts();

        for warning in &warnings {
            tracing::info!(field = %warning.field, code = %warning.code, "warning: {}", warning.message);
        }

        if !errors.is_empty() {
            return Err(ValidationError {
                file: None,
                issues: errors,
                warnings,
            }
            .into());
        }

        let Some(descriptor) = draft.into_descriptor() else {
            return Err(ValidationError {
                file: None,
                issues: vec![ValidationIssue::new(
                    "android",
                    "INCOMPLETE",
                    "Descriptor is missing required values",
                )],
                warnings,
            }
            .into());
        };

        tracing::info!(
            application_id = descriptor.application_id(),
            plugins = descriptor.plugins().len(),
            dependencies = descriptor.dependencies().len(),
            "loaded build descriptor"
        );
        Ok((descriptor, warnings))
    }

    /// Load a descriptor file
    pub fn load_file(&self, path: &Path) -> Result<BuildDescriptor, LoadError> {
        self.load_file_with_warnings(path).map(|(descriptor, _)| descriptor)
    }

    /// Load a descriptor file, also returning non-fatal issues
    pub fn load_file_with_warnings(
        &self,
        path: &Path,
    ) -> Result<(BuildDescriptor, Vec<ValidationIssue>), LoadError> {
        tracing::debug!(path = %path.display(), "loading build descriptor");

        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.load_str_with_warnings(&text).map_err(|err| match err {
            LoadError::Parse(e) => LoadError::Parse(e.in_file(path.to_path_buf())),
            LoadError::Validation(e) => LoadError::Validation(e.in_file(path.to_path_buf())),
            other => other,
        })
    }
}

/// Values collected from the syntax tree, before consistency checks
#[derive(Debug, Default)]
pub(crate) struct Draft {
    pub(crate) application_id: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) plugins: Vec<String>,
    pub(crate) min_sdk: Option<u32>,
    pub(crate) target_sdk: Option<u32>,
    pub(crate) compile_sdk: Option<u32>,
    pub(crate) ndk_version: Option<String>,
    pub(crate) version_code: Option<u32>,
    pub(crate) version_name: Option<String>,
    pub(crate) source_compat: Option<JavaVersion>,
    pub(crate) target_compat: Option<JavaVersion>,
    pub(crate) desugaring: Option<bool>,
    pub(crate) jvm_target: Option<JavaVersion>,
    pub(crate) build_types: Vec<BuildType>,
    pub(crate) signing_configs: Vec<String>,
    pub(crate) dependencies: Vec<Dependency>,
    /// Declaration index of each entry in `dependencies`, counting rejected declarations too
    pub(crate) dependency_slots: Vec<usize>,
    pub(crate) flutter_source: Option<String>,
    /// Fields whose value was present but could not be evaluated
    pub(crate) failed: BTreeSet<String>,
}

impl Draft {
    /// Issue field for the dependency at `index` in `dependencies`
    pub(crate) fn dependency_field(&self, index: usize) -> String {
        let slot = self.dependency_slots.get(index).copied().unwrap_or(index);
        format!("dependencies[{}]", slot)
    }

    pub(crate) fn compile_options(&self) -> CompileOptions {
        let defaults = CompileOptions::default();
        CompileOptions {
            source_compat: self.source_compat.unwrap_or(defaults.source_compat),
            target_compat: self.target_compat.unwrap_or(defaults.target_compat),
            desugaring: self.desugaring.unwrap_or(defaults.desugaring),
        }
    }

    fn into_descriptor(self) -> Option<BuildDescriptor> {
        let compile_options = self.compile_options();
        Some(BuildDescriptor {
            application_id: self.application_id?,
            namespace: self.namespace,
            plugins: self.plugins,
            sdk: SdkVersions {
                min: self.min_sdk?,
                target: self.target_sdk?,
                compile: self.compile_sdk?,
            },
            ndk_version: self.ndk_version,
            version: AppVersion {
                code: self.version_code,
                name: self.version_name,
            },
            compile_options,
            jvm_target: self.jvm_target,
            build_types: self.build_types,
            signing_configs: self.signing_configs,
            dependencies: self.dependencies,
            flutter_source: self.flutter_source,
        })
    }

    /// Give versionless modules the platform that manages them
    fn resolve_versions(&mut self) {
        let platforms: Vec<String> = self
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Platform)
            .map(|d| d.name.clone())
            .collect();

        for dep in &mut self.dependencies {
            if dep.kind != DependencyKind::Module || !dep.version_constraint.is_unmanaged() {
                continue;
            }
            let group = dep.group().unwrap_or_default().to_string();
            let platform = platforms
                .iter()
                .find(|p| p.split(':').next() == Some(group.as_str()))
                .or_else(|| platforms.first());
            if let Some(platform) = platform {
                dep.version_constraint = VersionConstraint::Managed(platform.clone());
            }
        }
    }
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
    Java(JavaVersion),
    Signing(String),
    Platform(String),
    Project(String),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Str(_) => "a string",
            Value::Int(_) => "an integer",
            Value::Bool(_) => "a boolean",
            Value::Null => "null",
            Value::Java(_) => "a JavaVersion",
            Value::Signing(_) => "a signing config",
            Value::Platform(_) => "a platform dependency",
            Value::Project(_) => "a project dependency",
        }
    }
}

impl From<&ContextValue> for Value {
    fn from(value: &ContextValue) -> Self {
        match value {
            ContextValue::Int(i) => Value::Int(*i),
            ContextValue::Bool(b) => Value::Bool(*b),
            ContextValue::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// Why an expression could not be evaluated
struct EvalError {
    code: &'static str,
    message: String,
    location: Location,
}

impl EvalError {
    fn new(code: &'static str, location: Location, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location,
        }
    }
}

/// Walks the syntax tree and fills a [`Draft`]
struct Extractor<'a> {
    context: &'a BuildContext,
    vals: BTreeMap<String, Expr>,
    draft: Draft,
    issues: ValidationResult,
    /// Dependency declarations seen so far, accepted or not
    declared: usize,
}

impl<'a> Extractor<'a> {
    fn new(context: &'a BuildContext) -> Self {
        Self {
            context,
            vals: BTreeMap::new(),
            draft: Draft::default(),
            issues: ValidationResult::new(),
            declared: 0,
        }
    }

    fn finish(mut self) -> (Draft, ValidationResult) {
        self.draft.resolve_versions();
        (self.draft, self.issues)
    }

    fn error(&mut self, field: &str, code: &str, location: Location, message: impl Into<String>) {
        self.issues.add_error(ValidationIssue::new(
            field,
            code,
            format!("{} (at {})", message.into(), location),
        ));
    }

    fn skip(&self, scope: &str, stmt: &Stmt) {
        tracing::debug!(scope, location = %stmt.location(), "skipping statement not used by the descriptor");
    }

    /// Visit a block body, registering `val`s and handing other statements to `f`
    ///
    /// A `val` is visible from its declaration to the end of the enclosing
    /// block, nested blocks included, and may shadow an outer one.
    fn visit<F>(&mut self, body: &[Stmt], mut f: F)
    where
        F: FnMut(&mut Self, &Stmt),
    {
        let outer = self.vals.clone();
        for stmt in body {
            match stmt {
                Stmt::Val(val) => {
                    self.vals.insert(val.name.clone(), val.value.clone());
                }
                other => f(self, other),
            }
        }
        self.vals = outer;
    }

    fn file(&mut self, stmts: &[Stmt]) {
        self.visit(stmts, |this, stmt| match stmt {
            Stmt::Block(block) => match block.name.as_str() {
                "plugins" => this.plugins(&block.body),
                "android" => this.android(&[], &block.body),
                "flutter" => this.flutter(&block.body),
                "dependencies" => this.dependencies(&block.body),
                _ => this.skip("top level", stmt),
            },
            Stmt::Assign(assign) if assign.target.first().map(String::as_str) == Some("android") => {
                this.android_assign(&assign.target[1..], &assign.value);
            }
            _ => this.skip("top level", stmt),
        });
    }

    // ---- evaluation ----

    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        self.eval_at_depth(expr, 0)
    }

    fn eval_at_depth(&self, expr: &Expr, depth: usize) -> Result<Value, EvalError> {
        if depth > MAX_VAL_DEPTH {
            return Err(EvalError::new(
                "UNRESOLVED",
                expr.location,
                "reference chain is too deep (recursive val?)",
            ));
        }

        match &expr.kind {
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Path(segments) => self.eval_path(segments, expr.location, depth),
            ExprKind::Call { callee, args } => match callee.as_path() {
                Some(path) => self.eval_call(path, args, expr.location, depth),
                None => Err(EvalError::new(
                    "UNSUPPORTED",
                    expr.location,
                    "unsupported call expression",
                )),
            },
            ExprKind::Infix { lhs, op, .. } if op == "as" => self.eval_at_depth(lhs, depth + 1),
            ExprKind::Infix { op, .. } => Err(EvalError::new(
                "UNSUPPORTED",
                expr.location,
                format!("unsupported infix operator `{}`", op),
            )),
            ExprKind::Member { name, .. } => Err(EvalError::new(
                "UNSUPPORTED",
                expr.location,
                format!("unsupported member access `.{}`", name),
            )),
            ExprKind::Index { .. } => Err(EvalError::new(
                "UNSUPPORTED",
                expr.location,
                "unsupported index expression",
            )),
        }
    }

    fn eval_path(&self, segments: &[String], location: Location, depth: usize) -> Result<Value, EvalError> {
        if let [name] = segments {
            if name == "null" {
                return Ok(Value::Null);
            }
            if let Some(expr) = self.vals.get(name) {
                return self.eval_at_depth(expr, depth + 1);
            }
        }

        if let [enum_name, constant] = segments {
            if enum_name == "JavaVersion" {
                return JavaVersion::from_constant(constant)
                    .map(Value::Java)
                    .ok_or_else(|| {
                        EvalError::new(
                            "UNKNOWN_JAVA_VERSION",
                            location,
                            format!("`JavaVersion.{}` is not a known Java version", constant),
                        )
                    });
            }
        }

        let key = segments.join(".");
        self.context.get(&key).map(Value::from).ok_or_else(|| {
            EvalError::new(
                "UNRESOLVED",
                location,
                format!("unresolved reference `{}`", key),
            )
        })
    }

    fn eval_call(
        &self,
        path: &[String],
        args: &[Arg],
        location: Location,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let name = path.join(".");

        if let Some((method, receiver)) = path.split_last() {
            if args.is_empty() && !receiver.is_empty() {
                match method.as_str() {
                    "toString" => {
                        return match self.eval_path(receiver, location, depth)? {
                            Value::Str(s) => Ok(Value::Str(s)),
                            Value::Int(i) => Ok(Value::Str(i.to_string())),
                            Value::Bool(b) => Ok(Value::Str(b.to_string())),
                            Value::Java(v) => Ok(Value::Str(v.to_string())),
                            other => Err(EvalError::new(
                                "TYPE",
                                location,
                                format!("cannot convert {} to a string", other.describe()),
                            )),
                        };
                    }
                    "toInt" => {
                        return match self.eval_path(receiver, location, depth)? {
                            Value::Int(i) => Ok(Value::Int(i)),
                            Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
                                EvalError::new(
                                    "TYPE",
                                    location,
                                    format!("`{}` is not an integer", s),
                                )
                            }),
                            other => Err(EvalError::new(
                                "TYPE",
                                location,
                                format!("cannot convert {} to an integer", other.describe()),
                            )),
                        };
                    }
                    _ => {}
                }
            }
        }

        let string_arg = || -> Result<String, EvalError> {
            match args {
                [Arg { name: None, value }] => match self.eval_at_depth(value, depth + 1)? {
                    Value::Str(s) => Ok(s),
                    other => Err(EvalError::new(
                        "TYPE",
                        value.location,
                        format!("`{}` expects a string, found {}", name, other.describe()),
                    )),
                },
                _ => Err(EvalError::new(
                    "TYPE",
                    location,
                    format!("`{}` expects exactly one argument", name),
                )),
            }
        };

        match name.as_str() {
            "platform" | "enforcedPlatform" => string_arg().map(Value::Platform),
            "project" => string_arg().map(Value::Project),
            "signingConfigs.getByName" | "signingConfigs.named" => string_arg().map(Value::Signing),
            "JavaVersion.toVersion" => {
                let value = match args {
                    [Arg { name: None, value }] => self.eval_at_depth(value, depth + 1)?,
                    _ => {
                        return Err(EvalError::new(
                            "TYPE",
                            location,
                            "`JavaVersion.toVersion` expects exactly one argument",
                        ));
                    }
                };
                let text = match value {
                    Value::Str(s) => s,
                    Value::Int(i) => i.to_string(),
                    other => {
                        return Err(EvalError::new(
                            "TYPE",
                            location,
                            format!("cannot convert {} to a JavaVersion", other.describe()),
                        ));
                    }
                };
                JavaVersion::parse(&text).map(Value::Java).ok_or_else(|| {
                    EvalError::new(
                        "UNKNOWN_JAVA_VERSION",
                        location,
                        format!("`{}` is not a known Java version", text),
                    )
                })
            }
            _ => Err(EvalError::new(
                "UNSUPPORTED",
                location,
                format!("unsupported call `{}(...)`", name),
            )),
        }
    }

    // ---- typed field access ----

    /// Evaluate `expr` for `field`, recording an issue on failure
    fn value(&mut self, field: &str, expr: &Expr) -> Option<Value> {
        match self.eval(expr) {
            Ok(value) => Some(value),
            Err(e) => {
                self.draft.failed.insert(field.to_string());
                self.error(field, e.code, e.location, e.message);
                None
            }
        }
    }

    fn type_error(&mut self, field: &str, expr: &Expr, expected: &str, found: &Value) {
        self.draft.failed.insert(field.to_string());
        self.error(
            field,
            "TYPE",
            expr.location,
            format!("expected {}, found {}", expected, found.describe()),
        );
    }

    fn string(&mut self, field: &str, expr: &Expr) -> Option<String> {
        match self.value(field, expr)? {
            Value::Str(s) => Some(s),
            other => {
                self.type_error(field, expr, "a string", &other);
                None
            }
        }
    }

    /// Non-negative integer; numeric strings from properties files are accepted
    fn uint(&mut self, field: &str, expr: &Expr) -> Option<u32> {
        let value = self.value(field, expr)?;
        let parsed = match &value {
            Value::Int(i) => u32::try_from(*i).ok(),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.type_error(field, expr, "a non-negative integer", &value);
        }
        parsed
    }

    fn boolean(&mut self, field: &str, expr: &Expr) -> Option<bool> {
        let value = self.value(field, expr)?;
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.type_error(field, expr, "a boolean", &value);
        }
        parsed
    }

    fn java_version(&mut self, field: &str, expr: &Expr) -> Option<JavaVersion> {
        let value = self.value(field, expr)?;
        let parsed = match &value {
            Value::Java(v) => Some(*v),
            Value::Str(s) => JavaVersion::parse(s),
            Value::Int(i) => JavaVersion::parse(&i.to_string()),
            _ => None,
        };
        if parsed.is_none() {
            self.draft.failed.insert(field.to_string());
            let message = match &value {
                Value::Str(_) | Value::Int(_) => "not a known Java version".to_string(),
                other => format!("expected a JavaVersion, found {}", other.describe()),
            };
            let code = if matches!(value, Value::Str(_) | Value::Int(_)) {
                "UNKNOWN_JAVA_VERSION"
            } else {
                "TYPE"
            };
            self.error(field, code, expr.location, message);
        }
        parsed
    }

    // ---- blocks ----

    fn plugins(&mut self, body: &[Stmt]) {
        self.visit(body, |this, stmt| {
            let Stmt::Expr(expr) = stmt else {
                this.skip("plugins", stmt);
                return;
            };

            // `id("x") version "1.0" apply false` declares `x`
            let mut base = expr;
            while let ExprKind::Infix { lhs, .. } = &base.kind {
                base = lhs.as_ref();
            }

            let field = format!("plugins[{}]", this.draft.plugins.len());
            let id = match (&base.kind, base.as_path_call()) {
                (_, Some((path, [Arg { name: None, value }]))) if path == ["alias"] => match value.as_path() {
                    Some(catalog) => Some(catalog.join(".")),
                    None => this.string(&field, value),
                },
                (_, Some((path, [Arg { name: None, value }]))) if path == ["id"] => this.string(&field, value),
                (_, Some((path, [Arg { name: None, value }]))) if path == ["kotlin"] => this
                    .string(&field, value)
                    .map(|module| format!("org.jetbrains.kotlin.{}", module)),
                (ExprKind::Path(segments), None) => Some(segments.join(".")),
                _ => {
                    this.error(
                        &field,
                        "UNSUPPORTED",
                        expr.location,
                        "unsupported plugin declaration",
                    );
                    None
                }
            };

            if let Some(id) = id {
                this.draft.plugins.push(id);
            }
        });
    }

    fn android(&mut self, prefix: &[String], body: &[Stmt]) {
        self.visit(body, |this, stmt| match stmt {
            Stmt::Assign(assign) => {
                let path: Vec<String> = prefix.iter().chain(&assign.target).cloned().collect();
                this.android_assign(&path, &assign.value);
            }
            Stmt::Block(block) if prefix.is_empty() => match block.name.as_str() {
                "compileOptions" | "defaultConfig" | "kotlinOptions" => {
                    this.android(&[block.name.clone()], &block.body);
                }
                "buildTypes" => this.build_types(&block.body),
                "signingConfigs" => this.signing_configs(&block.body),
                _ => this.skip("android", stmt),
            },
            _ => this.skip("android", stmt),
        });
    }

    fn android_assign(&mut self, path: &[String], value: &Expr) {
        let keys: Vec<&str> = path.iter().map(String::as_str).collect();
        let field = format!("android.{}", keys.join("."));

        match keys.as_slice() {
            ["namespace"] => self.draft.namespace = self.string(&field, value),
            ["compileSdk" | "compileSdkVersion"] => {
                self.draft.compile_sdk = self.uint("android.compileSdk", value);
            }
            ["ndkVersion"] => self.draft.ndk_version = self.string(&field, value),
            ["defaultConfig", "applicationId"] => {
                self.draft.application_id = self.string(&field, value);
            }
            ["defaultConfig", "minSdk" | "minSdkVersion"] => {
                self.draft.min_sdk = self.uint("android.defaultConfig.minSdk", value);
            }
            ["defaultConfig", "targetSdk" | "targetSdkVersion"] => {
                self.draft.target_sdk = self.uint("android.defaultConfig.targetSdk", value);
            }
            ["defaultConfig", "versionCode"] => self.draft.version_code = self.uint(&field, value),
            ["defaultConfig", "versionName"] => self.draft.version_name = self.string(&field, value),
            ["compileOptions", "sourceCompatibility"] => {
                self.draft.source_compat = self.java_version(&field, value);
            }
            ["compileOptions", "targetCompatibility"] => {
                self.draft.target_compat = self.java_version(&field, value);
            }
            ["compileOptions", "isCoreLibraryDesugaringEnabled"] => {
                self.draft.desugaring = self.boolean(&field, value);
            }
            ["kotlinOptions", "jvmTarget"] => self.draft.jvm_target = self.java_version(&field, value),
            _ => tracing::debug!(property = %field, "skipping property not used by the descriptor"),
        }
    }

    /// Entry name of `release { }` or `create("release") { }`
    fn container_entry(block: &Block) -> Option<String> {
        if block.args.is_empty() {
            Some(block.name.clone())
        } else if NAMED_CONTAINER_CALLS.contains(&block.name.as_str()) {
            block.label().map(str::to_string)
        } else {
            None
        }
    }

    fn build_types(&mut self, body: &[Stmt]) {
        self.visit(body, |this, stmt| {
            let Some((block, name)) = (match stmt {
                Stmt::Block(block) => Self::container_entry(block).map(|name| (block, name)),
                _ => None,
            }) else {
                this.skip("buildTypes", stmt);
                return;
            };

            let index = match this.draft.build_types.iter().position(|b| b.name == name) {
                Some(index) => index,
                None => {
                    this.draft.build_types.push(BuildType::named(name.as_str()));
                    this.draft.build_types.len() - 1
                }
            };
            this.build_type(index, &block.body);
        });
    }

    fn build_type(&mut self, index: usize, body: &[Stmt]) {
        let name = self.draft.build_types[index].name.clone();
        self.visit(body, |this, stmt| {
            let Stmt::Assign(assign) = stmt else {
                this.skip("buildType", stmt);
                return;
            };
            let field = format!("android.buildTypes.{}.{}", name, assign.target_name());

            match assign.target_name().as_str() {
                "signingConfig" => match this.value(&field, &assign.value) {
                    Some(Value::Signing(profile)) => {
                        this.draft.build_types[index].signing_config = Some(SigningConfigRef(profile));
                    }
                    Some(Value::Null) => this.draft.build_types[index].signing_config = None,
                    Some(other) => {
                        this.type_error(&field, &assign.value, "signingConfigs.getByName(...)", &other);
                    }
                    None => {}
                },
                "isMinifyEnabled" => {
                    if let Some(b) = this.boolean(&field, &assign.value) {
                        this.draft.build_types[index].minify_enabled = b;
                    }
                }
                "isShrinkResources" => {
                    if let Some(b) = this.boolean(&field, &assign.value) {
                        this.draft.build_types[index].shrink_resources = b;
                    }
                }
                _ => this.skip("buildType", stmt),
            }
        });
    }

    fn signing_configs(&mut self, body: &[Stmt]) {
        self.visit(body, |this, stmt| {
            let entry = match stmt {
                Stmt::Block(block) => Self::container_entry(block),
                _ => None,
            };
            match entry {
                Some(name) if !this.draft.signing_configs.contains(&name) => {
                    this.draft.signing_configs.push(name);
                }
                Some(_) => {}
                None => this.skip("signingConfigs", stmt),
            }
        });
    }

    fn flutter(&mut self, body: &[Stmt]) {
        self.visit(body, |this, stmt| match stmt {
            Stmt::Assign(assign) if assign.target_name() == "source" => {
                this.draft.flutter_source = this.string("flutter.source", &assign.value);
            }
            _ => this.skip("flutter", stmt),
        });
    }

    fn dependencies(&mut self, body: &[Stmt]) {
        self.visit(body, |this, stmt| match stmt {
            Stmt::Expr(expr) => match expr.as_path_call() {
                Some(([configuration], args)) => this.dependency(configuration, args, expr.location),
                _ => this.skip("dependencies", stmt),
            },
            // `implementation("...") { exclude(...) }`
            Stmt::Block(block) if !block.args.is_empty() && !block.name.contains('.') => {
                this.dependency(&block.name, &block.args, block.location);
            }
            _ => this.skip("dependencies", stmt),
        });
    }

    fn dependency(&mut self, configuration: &str, args: &[Arg], location: Location) {
        let slot = self.declared;
        self.declared += 1;
        self.declare(slot, configuration, args, location);
    }

    fn declare(&mut self, slot: usize, configuration: &str, args: &[Arg], location: Location) {
        let field = format!("dependencies[{}]", slot);

        // `add("implementation", "g:a:v")`
        if configuration == "add" {
            if let [Arg { name: None, value: conf }, rest @ ..] = args {
                if let Some(conf) = self.string(&field, conf) {
                    self.declare(slot, &conf, rest, location);
                }
                return;
            }
        }

        let notation = match args {
            [Arg { name: None, value }] => self.notation(&field, value),
            named if !named.is_empty() && named.iter().all(|a| a.name.is_some()) => {
                self.named_notation(&field, named, location)
            }
            _ => {
                self.error(
                    &field,
                    "UNKNOWN_DEPENDENCY",
                    location,
                    format!("`{}` expects one dependency notation", configuration),
                );
                None
            }
        };

        if let Some((name, version_constraint, kind)) = notation {
            self.draft.dependencies.push(Dependency {
                configuration: configuration.to_string(),
                name,
                version_constraint,
                kind,
            });
            self.draft.dependency_slots.push(slot);
        }
    }

    fn notation(
        &mut self,
        field: &str,
        expr: &Expr,
    ) -> Option<(String, VersionConstraint, DependencyKind)> {
        // `kotlin("stdlib")` expands to the Kotlin artifact
        if let Some((path, args)) = expr.as_path_call() {
            if path == ["kotlin"] {
                return self.kotlin_module(field, args, expr.location);
            }
        }

        let (text, kind) = match self.value(field, expr)? {
            Value::Str(s) => (s, DependencyKind::Module),
            Value::Platform(s) => (s, DependencyKind::Platform),
            Value::Project(path) => return Some((path, VersionConstraint::Local, DependencyKind::Project)),
            other => {
                self.type_error(field, expr, "a dependency notation", &other);
                return None;
            }
        };

        match rules::parse_coordinate(&text) {
            Some((name, version)) => {
                let constraint = version.map_or(VersionConstraint::Unmanaged, VersionConstraint::Declared);
                Some((name, constraint, kind))
            }
            None => {
                self.error(
                    field,
                    "UNKNOWN_DEPENDENCY",
                    expr.location,
                    format!("unknown dependency identifier `{}`", text),
                );
                None
            }
        }
    }

    fn kotlin_module(
        &mut self,
        field: &str,
        args: &[Arg],
        location: Location,
    ) -> Option<(String, VersionConstraint, DependencyKind)> {
        let mut values = Vec::new();
        for arg in args {
            values.push(self.string(field, &arg.value)?);
        }
        let (module, constraint) = match values.as_slice() {
            [module] => (module, VersionConstraint::Managed("org.jetbrains.kotlin".to_string())),
            [module, version] => (module, VersionConstraint::Declared(version.clone())),
            _ => {
                self.error(
                    field,
                    "UNKNOWN_DEPENDENCY",
                    location,
                    "`kotlin` expects a module and an optional version",
                );
                return None;
            }
        };
        Some((
            format!("org.jetbrains.kotlin:kotlin-{}", module),
            constraint,
            DependencyKind::Module,
        ))
    }

    /// `implementation(group = "g", name = "a", version = "v")`
    fn named_notation(
        &mut self,
        field: &str,
        args: &[Arg],
        location: Location,
    ) -> Option<(String, VersionConstraint, DependencyKind)> {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        for arg in args {
            let key = arg.name.as_deref().unwrap_or_default();
            let value = self.string(field, &arg.value)?;
            parts.insert(key, value);
        }

        let (Some(group), Some(name)) = (parts.get("group"), parts.get("name")) else {
            self.error(
                field,
                "UNKNOWN_DEPENDENCY",
                location,
                "named dependency notation needs `group` and `name`",
            );
            return None;
        };

        let notation = match parts.get("version") {
            Some(version) => format!("{}:{}:{}", group, name, version),
            None => format!("{}:{}", group, name),
        };
        match rules::parse_coordinate(&notation) {
            Some((name, version)) => Some((
                name,
                version.map_or(VersionConstraint::Unmanaged, VersionConstraint::Declared),
                DependencyKind::Module,
            )),
            None => {
                self.error(
                    field,
                    "UNKNOWN_DEPENDENCY",
                    location,
                    format!("unknown dependency identifier `{}`", notation),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSource;
    use proptest::prelude::*;

    const TASKSYNC: &str = include_str!("../testdata/tasksync.gradle.kts");

    fn descriptor(min: &str, target: &str, compile: &str) -> String {
        format!(
            r#"plugins {{
    id("com.android.application")
}}

android {{
    compileSdk = {compile}
    defaultConfig {{
        applicationId = "com.example.app"
        minSdk = {min}
        targetSdk = {target}
    }}
}}
"#
        )
    }

    fn with_android(body: &str) -> String {
        format!(
            "plugins {{\n    id(\"com.android.application\")\n}}\nandroid {{\n    compileSdk = 35\n    defaultConfig {{\n        applicationId = \"com.example.app\"\n        minSdk = 21\n        targetSdk = 35\n    }}\n{}\n}}\n",
            body
        )
    }

    fn validation_codes(err: &LoadError) -> Vec<(String, String)> {
        match err {
            LoadError::Validation(e) => e
                .issues
                .iter()
                .map(|i| (i.field.clone(), i.code.clone()))
                .collect(),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_load_tasksync_descriptor() {
        let (descriptor, warnings) = DescriptorLoader::default()
            .load_str_with_warnings(TASKSYNC)
            .unwrap();

        assert_eq!(descriptor.application_id(), "com.appdev.tasksync");
        assert_eq!(descriptor.namespace(), Some("com.appdev.tasksync"));
        assert_eq!(
            descriptor.plugins(),
            [
                "com.android.application",
                "kotlin-android",
                "dev.flutter.flutter-gradle-plugin",
                "com.google.gms.google-services",
            ]
        );
        assert_eq!(
            descriptor.sdk(),
            SdkVersions {
                min: 21,
                target: 35,
                compile: 35
            }
        );
        assert_eq!(descriptor.ndk_version(), Some("27.0.12077973"));
        assert_eq!(descriptor.version().code, Some(1));
        assert_eq!(descriptor.version().name.as_deref(), Some("1.0.0"));

        let options = descriptor.compile_options();
        assert_eq!(options.source_compat, JavaVersion::VERSION_17);
        assert_eq!(options.target_compat, JavaVersion::VERSION_17);
        assert!(options.desugaring);
        assert_eq!(descriptor.jvm_target(), Some(JavaVersion::VERSION_17));

        assert_eq!(descriptor.signing_config().map(SigningConfigRef::name), Some("debug"));
        assert_eq!(descriptor.flutter_source(), Some("../.."));

        let deps = descriptor.dependencies();
        assert_eq!(deps.len(), 5);
        assert_eq!(deps[0].kind, DependencyKind::Platform);
        assert_eq!(
            deps[0].version_constraint,
            VersionConstraint::Declared("34.3.0".into())
        );
        assert_eq!(deps[2].name, "com.google.firebase:firebase-auth");
        assert_eq!(
            deps[2].version_constraint,
            VersionConstraint::Managed("com.google.firebase:firebase-bom".into())
        );
        assert_eq!(deps[4].configuration, "coreLibraryDesugaring");

        assert!(warnings.iter().any(|w| w.code == "DEBUG_SIGNED_RELEASE"));
    }

    #[test]
    fn test_loading_is_deterministic() {
        let loader = DescriptorLoader::default();
        let first = loader.load_str(TASKSYNC).unwrap();
        let second = loader.load_str(TASKSYNC).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ordered_sdk_levels_load() {
        let descriptor = DescriptorLoader::default()
            .load_str(&descriptor("21", "34", "34"))
            .unwrap();
        assert_eq!(descriptor.sdk().min, 21);
        assert_eq!(descriptor.sdk().target, 34);
        assert_eq!(descriptor.compile_options(), &CompileOptions::default());
    }

    #[test]
    fn test_min_above_target_fails() {
        let err = DescriptorLoader::default()
            .load_str(&descriptor("35", "21", "35"))
            .unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [("android.defaultConfig.minSdk".to_string(), "ORDER".to_string())]
        );
    }

    #[test]
    fn test_malformed_block_is_a_parse_error() {
        let text = "android {\n    compileSdk = 35\n";
        match DescriptorLoader::default().load_str(text) {
            Err(LoadError::Parse(e)) => {
                assert!(e.message.contains("unclosed block `android` opened at 1:1"), "{}", e.message);
                assert_eq!(e.location.line, 3);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_deeply_nested_descriptor_is_a_parse_error() {
        let text = with_android(&format!(
            "    compileSdk = {}35{}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        ));
        match DescriptorLoader::default().load_str(&text) {
            Err(LoadError::Parse(e)) => assert_eq!(e.message, "nesting too deep"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_every_issue_is_reported() {
        let text = r#"
android {
    compileSdk = "latest"
    defaultConfig {
        applicationId = "app"
        minSdk = flutter.nope
    }
}
"#;
        let err = DescriptorLoader::default().load_str(text).unwrap_err();
        let codes = validation_codes(&err);
        assert!(codes.contains(&("android.compileSdk".into(), "TYPE".into())));
        assert!(codes.contains(&("android.defaultConfig.minSdk".into(), "UNRESOLVED".into())));
        assert!(codes.contains(&("android.defaultConfig.targetSdk".into(), "REQUIRED".into())));
        assert!(codes.contains(&("android.defaultConfig.applicationId".into(), "PATTERN".into())));
        assert!(codes.contains(&("plugins".into(), "MISSING_PLUGIN".into())));
        // failed values are not reported a second time as missing
        assert!(!codes.contains(&("android.compileSdk".into(), "REQUIRED".into())));
    }

    #[test]
    fn test_unresolved_reference_names_location() {
        let err = DescriptorLoader::default()
            .load_str(&descriptor("flutter.nope", "34", "34"))
            .unwrap_err();
        let LoadError::Validation(e) = err else {
            panic!("expected validation error");
        };
        assert_eq!(e.issues.len(), 1);
        assert!(e.issues[0].message.contains("`flutter.nope`"));
        assert!(e.issues[0].message.contains("at 9:18"), "{}", e.issues[0].message);
    }

    #[test]
    fn test_context_overrides_apply() {
        let mut loader = DescriptorLoader::default();
        loader
            .context_mut()
            .apply_overrides(&[("flutter.minSdkVersion".to_string(), "24".to_string())]);
        let descriptor = loader.load_str(TASKSYNC).unwrap();
        assert_eq!(descriptor.sdk().min, 24);
    }

    #[test]
    fn test_context_values_convert_leniently() {
        let mut loader = DescriptorLoader::default();
        loader.context_mut().insert(
            "app.code",
            ContextValue::Str("17".into()),
            ContextSource::Config,
        );
        let text = with_android(
            "    compileOptions {\n        sourceCompatibility = JavaVersion.toVersion(app.code)\n        targetCompatibility = JavaVersion.VERSION_17\n    }",
        );
        let descriptor = loader.load_str(&text).unwrap();
        assert_eq!(descriptor.compile_options().source_compat, JavaVersion::VERSION_17);
    }

    #[test]
    fn test_vals_and_named_build_types() {
        let text = r#"
val releaseMinify = true
plugins {
    id("com.android.application")
    kotlin("android")
}
android {
    compileSdk = 35
    defaultConfig {
        applicationId = "com.example.app"
        minSdk = 23
        targetSdk = 35
    }
    signingConfigs {
        create("upload") {
            storeFile = file("upload.jks")
        }
    }
    buildTypes {
        release {
            isMinifyEnabled = releaseMinify
            signingConfig = signingConfigs.getByName("upload")
        }
        create("staging") {
            isShrinkResources = true
        }
        getByName("release") {
            isShrinkResources = true
        }
    }
}
"#;
        let descriptor = DescriptorLoader::default().load_str(text).unwrap();
        assert!(descriptor.has_plugin("org.jetbrains.kotlin.android"));
        assert_eq!(descriptor.signing_configs(), ["upload"]);
        assert_eq!(descriptor.build_types().len(), 2);

        let release = descriptor.build_type("release").unwrap();
        assert!(release.minify_enabled);
        assert!(release.shrink_resources);
        assert_eq!(descriptor.signing_config().map(|s| s.to_string()).as_deref(), Some("upload"));
        assert!(descriptor.build_type("staging").unwrap().shrink_resources);
    }

    #[test]
    fn test_vals_are_scoped_to_their_block() {
        let text = r#"
plugins {
    id("com.android.application")
}
val sdk = 35
android {
    compileSdk = sdk
    defaultConfig {
        val sdk = 21
        applicationId = "com.example.app"
        minSdk = sdk
        targetSdk = 35
    }
    ndkVersion = sdk.toString()
}
"#;
        let descriptor = DescriptorLoader::default().load_str(text).unwrap();
        assert_eq!(descriptor.sdk().min, 21);
        assert_eq!(descriptor.sdk().compile, 35);
        assert_eq!(descriptor.ndk_version(), Some("35"));
    }

    #[test]
    fn test_val_is_not_visible_in_sibling_block() {
        let text = with_android("    val bom = platform(\"com.google.firebase:firebase-bom:34.3.0\")")
            + "dependencies {\n    implementation(bom)\n}\n";
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [("dependencies[0]".to_string(), "UNRESOLVED".to_string())]
        );
    }

    #[test]
    fn test_dependency_forms_keep_order() {
        let text = r#"
plugins {
    id("com.android.application")
}
android {
    compileSdk = 35
    defaultConfig {
        applicationId = "com.example.app"
        minSdk = 23
        targetSdk = 35
    }
}
dependencies {
    implementation(project(":core"))
    implementation(kotlin("stdlib", "2.0.0"))
    add("testImplementation", "junit:junit:4.13.2")
    implementation(group = "androidx.core", name = "core-ktx", version = "1.13.1")
    implementation("io.coil-kt:coil:2.6.0") {
        exclude(group = "org.jetbrains.kotlin")
    }
}
"#;
        let descriptor = DescriptorLoader::default().load_str(text).unwrap();
        let names: Vec<&str> = descriptor
            .dependencies()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                ":core",
                "org.jetbrains.kotlin:kotlin-stdlib",
                "junit:junit",
                "androidx.core:core-ktx",
                "io.coil-kt:coil",
            ]
        );
        assert_eq!(descriptor.dependencies()[0].version_constraint, VersionConstraint::Local);
        assert_eq!(descriptor.dependencies()[2].configuration, "testImplementation");
    }

    #[test]
    fn test_versionless_module_without_platform_fails() {
        let text = with_android("") + "dependencies {\n    implementation(\"com.google.firebase:firebase-auth\")\n}\n";
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [("dependencies[0]".to_string(), "UNMANAGED_VERSION".to_string())]
        );
    }

    #[test]
    fn test_unknown_dependency_identifier_fails() {
        let text = with_android("") + "dependencies {\n    implementation(\"firebase-auth\")\n    implemntation(\"a:b:1\")\n}\n";
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        let codes = validation_codes(&err);
        assert!(codes.contains(&("dependencies[0]".into(), "UNKNOWN_DEPENDENCY".into())));
        assert!(codes.contains(&("dependencies[1]".into(), "UNKNOWN_CONFIGURATION".into())));
    }

    #[test]
    fn test_rejected_dependency_keeps_its_index() {
        let text = with_android("")
            + r#"dependencies {
    implementation("firebase-auth")
    implementation("com.google.firebase:firebase-auth")
    add("implementation", 42)
    testImplementation("a:b")
}
"#;
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        let mut codes = validation_codes(&err);
        codes.sort();
        assert_eq!(
            codes,
            [
                ("dependencies[0]".to_string(), "UNKNOWN_DEPENDENCY".to_string()),
                ("dependencies[1]".to_string(), "UNMANAGED_VERSION".to_string()),
                ("dependencies[2]".to_string(), "TYPE".to_string()),
                ("dependencies[3]".to_string(), "UNMANAGED_VERSION".to_string()),
            ]
        );
    }

    #[test]
    fn test_flutter_plugin_before_android_fails() {
        let text = with_android("").replace(
            "    id(\"com.android.application\")\n",
            "    id(\"dev.flutter.flutter-gradle-plugin\")\n    id(\"com.android.application\")\n",
        );
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [("plugins[0]".to_string(), "PLUGIN_ORDER".to_string())]
        );
    }

    #[test]
    fn test_desugaring_requires_library() {
        let text = with_android(
            "    compileOptions {\n        isCoreLibraryDesugaringEnabled = true\n    }",
        );
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [(
                "android.compileOptions.isCoreLibraryDesugaringEnabled".to_string(),
                "CUSTOM".to_string()
            )]
        );
    }

    #[test]
    fn test_unknown_java_version_fails() {
        let text = with_android(
            "    compileOptions {\n        sourceCompatibility = JavaVersion.VERSION_42\n    }",
        );
        let err = DescriptorLoader::default().load_str(&text).unwrap_err();
        assert_eq!(
            validation_codes(&err),
            [(
                "android.compileOptions.sourceCompatibility".to_string(),
                "UNKNOWN_JAVA_VERSION".to_string()
            )]
        );
    }

    #[test]
    fn test_load_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.gradle.kts");
        std::fs::write(&path, "android {\n").unwrap();

        let err = DescriptorLoader::default().load_file(&path).unwrap_err();
        let LoadError::Parse(parse) = &err else {
            panic!("expected parse error, got {err}");
        };
        assert_eq!(parse.file.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));

        let missing = dir.path().join("missing.gradle.kts");
        assert!(matches!(
            DescriptorLoader::default().load_file(&missing),
            Err(LoadError::Io { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_sdk_levels_load_only_when_ordered(min in 1u32..=36, target in 1u32..=36, compile in 1u32..=36) {
            let result = DescriptorLoader::default().load_str(&descriptor(
                &min.to_string(),
                &target.to_string(),
                &compile.to_string(),
            ));
            match result {
                Ok(descriptor) => {
                    let sdk = descriptor.sdk();
                    prop_assert!(sdk.min <= sdk.target && sdk.target <= sdk.compile);
                }
                Err(err) => {
                    prop_assert!(min > target || target > compile);
                    prop_assert!(matches!(err, LoadError::Validation(_)));
                }
            }
        }
    }
}
