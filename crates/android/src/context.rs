//! Externally supplied build constants
//!
//! A descriptor refers to values it does not define itself, such as
//! `flutter.minSdkVersion` or `flutter.versionCode`. The [`BuildContext`]
//! answers those lookups. It is assembled from layers, later layers winning:
//!
//! 1. the `[flutter]` defaults of the tool configuration
//! 2. `local.properties` of the Android project
//! 3. the `[properties]` table of the tool configuration
//! 4. `-P key=value` overrides from the command line

use crate::error::LoadError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tasksync_core::config::{ConfigSchema, FlutterConfig, PropertyValue};

/// A context value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Int(i) => write!(f, "{}", i),
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&PropertyValue> for ContextValue {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Integer(i) => ContextValue::Int(*i),
            PropertyValue::Boolean(b) => ContextValue::Bool(*b),
            PropertyValue::String(s) => ContextValue::Str(s.clone()),
        }
    }
}

/// Where a context value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    Defaults,
    LocalProperties,
    Config,
    CommandLine,
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContextSource::Defaults => "defaults",
            ContextSource::LocalProperties => "local.properties",
            ContextSource::Config => "config",
            ContextSource::CommandLine => "command line",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub value: ContextValue,
    pub source: ContextSource,
}

/// Resolved external constants, keyed by dotted name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildContext {
    entries: BTreeMap<String, ContextEntry>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context holding only the `flutter.*` defaults
    pub fn with_flutter_defaults(flutter: &FlutterConfig) -> Self {
        let mut context = Self::new();
        let defaults = [
            ("flutter.compileSdkVersion", ContextValue::Int(flutter.compile_sdk_version.into())),
            ("flutter.minSdkVersion", ContextValue::Int(flutter.min_sdk_version.into())),
            ("flutter.targetSdkVersion", ContextValue::Int(flutter.target_sdk_version.into())),
            ("flutter.ndkVersion", ContextValue::Str(flutter.ndk_version.clone())),
            ("flutter.versionCode", ContextValue::Int(flutter.version_code.into())),
            ("flutter.versionName", ContextValue::Str(flutter.version_name.clone())),
        ];
        for (key, value) in defaults {
            context.insert(key, value, ContextSource::Defaults);
        }
        context
    }

    /// Build the full layered context for a configuration
    ///
    /// `local.properties` is read from the configured Android directory when it
    /// exists; its absence is not an error.
    pub fn from_config(config: &ConfigSchema) -> Result<Self, LoadError> {
        let mut context = Self::with_flutter_defaults(&config.flutter);

        let local = config.general.local_properties_path();
        if local.is_file() {
            context.merge_properties_file(&local)?;
        }

        for (key, value) in &config.properties {
            context.insert(key.clone(), value.into(), ContextSource::Config);
        }

        Ok(context)
    }

    /// Set a value, replacing any lower layer
    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue, source: ContextSource) {
        self.entries
            .insert(key.into(), ContextEntry { value, source });
    }

    /// Merge a Java properties file
    pub fn merge_properties_file(&mut self, path: &Path) -> Result<(), LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.merge_properties_str(&text, ContextSource::LocalProperties);
        tracing::debug!(path = %path.display(), count, "merged properties file");
        Ok(())
    }

    /// Merge Java properties text, returning the number of entries read
    pub fn merge_properties_str(&mut self, text: &str, source: ContextSource) -> usize {
        let pairs = parse_properties(text);
        let count = pairs.len();
        for (key, value) in pairs {
            self.insert(key, ContextValue::Str(value), source);
        }
        count
    }

    /// Apply `key=value` overrides from the command line
    pub fn apply_overrides<'a, I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        for (key, value) in overrides {
            self.insert(key.clone(), ContextValue::Str(value.clone()), ContextSource::CommandLine);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a `key=value` command line override
pub fn parse_override(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse Java properties text into ordered key/value pairs
///
/// Supports `=`, `:` and whitespace separators, `#`/`!` comments, trailing
/// backslash continuations and the usual backslash escapes.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut logical = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();

        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }
        logical.push_str(line);

        pairs.push(split_property(&logical));
        logical.clear();
    }

    if !logical.is_empty() {
        pairs.push(split_property(&logical));
    }

    pairs
}

/// An odd number of trailing backslashes continues the line
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_property(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    key.push(unescape(escaped));
                }
            }
            '=' | ':' => break,
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if matches!(chars.peek(), Some('=' | ':')) {
                    chars.next();
                }
                break;
            }
            c => key.push(c),
        }
    }

    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                value.push(unescape(escaped));
            }
        } else {
            value.push(c);
        }
    }

    (key, value)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}
