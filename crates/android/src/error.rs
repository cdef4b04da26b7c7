//! Descriptor loading errors
//!
//! Loading fails in exactly one of three ways: the file cannot be read, the
//! text is not well-formed ([`ParseError`]), or the values are inconsistent
//! ([`ValidationError`]). None of them is recoverable.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tasksync_core::error::{Error as CoreError, ErrorCode};
use tasksync_core::validation::ValidationIssue;
use thiserror::Error;

/// 1-based position in the descriptor text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Malformed descriptor text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    /// File the text came from, when loaded from disk
    pub file: Option<PathBuf>,
    pub location: Location,
    pub message: String,
}

impl ParseError {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            file: None,
            location,
            message: message.into(),
        }
    }

    pub(crate) fn in_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}: {}", file.display(), self.location, self.message),
            None => write!(f, "{}: {}", self.location, self.message),
        }
    }
}

/// Well-formed text whose values are inconsistent or incomplete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub file: Option<PathBuf>,
    /// Every fatal issue found
    pub issues: Vec<ValidationIssue>,
    /// Non-fatal issues found alongside
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationError {
    pub(crate) fn in_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        write!(f, "invalid build descriptor")?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Any failure while producing a [`crate::BuildDescriptor`]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<LoadError> for CoreError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { path, source } => {
                let code = match source.kind() {
                    std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
                    std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
                    _ => ErrorCode::IoError,
                };
                CoreError::new(code, format!("Failed to read {}", path.display()))
                    .with_source(source)
                    .with_suggestion("Check the descriptor path or set general.descriptor in .tasksync-build.toml")
            }
            LoadError::Parse(e) => CoreError::new(ErrorCode::ConfigParseError, e.to_string())
                .with_suggestion("Fix the syntax at the reported line and column"),
            LoadError::Validation(e) => {
                CoreError::new(ErrorCode::ConfigValidationError, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_with_file() {
        let err = ParseError::new(Location::new(12, 5), "expected '}'")
            .in_file(PathBuf::from("app/build.gradle.kts"));
        assert_eq!(err.to_string(), "app/build.gradle.kts:12:5: expected '}'");
    }

    #[test]
    fn test_validation_error_lists_issues() {
        let err = ValidationError {
            file: None,
            issues: vec![
                ValidationIssue::new("android.defaultConfig.minSdk", "ORDER", "Must not exceed targetSdk"),
                ValidationIssue::new("dependencies[0]", "UNKNOWN_DEPENDENCY", "Unknown dependency identifier"),
            ],
            warnings: Vec::new(),
        };
        let text = err.to_string();
        assert!(text.starts_with("invalid build descriptor"));
        assert!(text.contains("android.defaultConfig.minSdk: Must not exceed targetSdk"));
        assert!(text.contains("dependencies[0]"));
    }

    #[test]
    fn test_core_error_codes() {
        let parse: CoreError = LoadError::from(ParseError::new(Location::new(1, 1), "x")).into();
        assert_eq!(parse.code, ErrorCode::ConfigParseError);

        let validation: CoreError = LoadError::from(ValidationError {
            file: None,
            issues: Vec::new(),
            warnings: Vec::new(),
        })
        .into();
        assert_eq!(validation.code, ErrorCode::ConfigValidationError);
        assert_eq!(validation.exit_code(), tasksync_core::error::exit_codes::VALIDATION_ERROR);

        let io: CoreError = LoadError::Io {
            path: PathBuf::from("missing.kts"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        }
        .into();
        assert_eq!(io.code, ErrorCode::FileNotFound);
    }
}
