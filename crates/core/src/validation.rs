//! Field validation
//!
//! A fluent [`Validator`] collects every problem instead of stopping at the
//! first one, so a user fixing a configuration sees the whole list at once.
//!
//! # Example
//!
//! ```rust
//! use tasksync_core::validation::Validator;
//!
//! let result = Validator::new()
//!     .required("defaultConfig.applicationId", "com.appdev.tasksync")
//!     .range("defaultConfig.minSdk", 21, 1, 36)
//!     .ordered("defaultConfig.minSdk", 21, "defaultConfig.targetSdk", 34)
//!     .validate();
//!
//! assert!(result.is_valid());
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field that failed validation
    pub field: String,
    /// Error message
    pub message: String,
    /// Machine-readable code
    pub code: String,
    /// Expected value (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Actual value (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationIssue {
    /// Create an issue with no expected/actual values
    pub fn new(field: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.to_string(),
            expected: None,
            actual: None,
        }
    }

    /// Attach the expected value
    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Attach the actual value
    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    /// Get all warnings
    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    /// Add an error
    pub fn add_error(&mut self, error: ValidationIssue) {
        self.errors.push(error);
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: ValidationIssue) {
        self.warnings.push(warning);
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Split into errors and warnings
    pub fn into_parts(self) -> (Vec<ValidationIssue>, Vec<ValidationIssue>) {
        (self.errors, self.warnings)
    }
}

/// Fluent validator builder
pub struct Validator {
    result: ValidationResult,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            result: ValidationResult::new(),
        }
    }

    /// Validate that a field is not empty
    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.result.add_error(
                ValidationIssue::new(field, "REQUIRED", "Field is required")
                    .expected("non-empty value")
                    .actual("empty"),
            );
        }
        self
    }

    /// Validate against a compiled regex
    pub fn matches(mut self, field: &str, value: &str, re: &Regex, description: &str) -> Self {
        if !re.is_match(value) {
            self.result.add_error(
                ValidationIssue::new(field, "PATTERN", format!("Must match {}", description))
                    .expected(description)
                    .actual(value),
            );
        }
        self
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + fmt::Display>(mut self, field: &str, value: &T, allowed: &[T]) -> Self {
        if !allowed.contains(value) {
            let allowed = allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            self.result.add_error(
                ValidationIssue::new(field, "ONE_OF", format!("Must be one of: {}", allowed))
                    .expected(allowed)
                    .actual(value.to_string()),
            );
        }
        self
    }

    /// Validate a numeric range
    pub fn range<T: PartialOrd + fmt::Display>(mut self, field: &str, value: T, min: T, max: T) -> Self {
        if value < min || value > max {
            self.result.add_error(
                ValidationIssue::new(field, "RANGE", format!("Must be between {} and {}", min, max))
                    .expected(format!("{} - {}", min, max))
                    .actual(value.to_string()),
            );
        }
        self
    }

    /// Validate that `lower <= upper`, reporting against the lower field
    pub fn ordered<T: PartialOrd + fmt::Display>(
        mut self,
        lower_field: &str,
        lower: T,
        upper_field: &str,
        upper: T,
    ) -> Self {
        if lower > upper {
            self.result.add_error(
                ValidationIssue::new(
                    lower_field,
                    "ORDER",
                    format!("Must not exceed {} ({} > {})", upper_field, lower, upper),
                )
                .expected(format!("<= {}", upper))
                .actual(lower.to_string()),
            );
        }
        self
    }

    /// Add a custom validation
    pub fn custom<F>(mut self, field: &str, f: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(message) = f() {
            self.result
                .add_error(ValidationIssue::new(field, "CUSTOM", message));
        }
        self
    }

    /// Add a warning (non-blocking)
    pub fn warn_if(mut self, field: &str, condition: bool, message: &str) -> Self {
        if condition {
            self.result
                .add_warning(ValidationIssue::new(field, "WARNING", message));
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> ValidationResult {
        self.result
    }
}
