//! Terminal output utilities
//!
//! Provides consistent formatting for CLI output. Colors follow terminal
//! support and can be turned off with [`set_color`].

use owo_colors::{OwoColorize, Stream};
use tasksync_core::error::Error;
use tasksync_core::validation::ValidationIssue;

/// Force colors on or off, overriding terminal detection
pub fn set_color(enabled: bool) {
    owo_colors::set_override(enabled);
}

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".if_supports_color(Stream::Stdout, |t| t.green()), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".if_supports_color(Stream::Stderr, |t| t.red()), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".if_supports_color(Stream::Stderr, |t| t.yellow()), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".if_supports_color(Stream::Stdout, |t| t.blue()), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.if_supports_color(Stream::Stdout, |t| t.bold()));
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Print a subheader
    pub fn subheader(message: &str) {
        println!();
        println!("{}", message.if_supports_color(Stream::Stdout, |t| t.dimmed()));
    }

    /// Print an aligned `label: value` line
    pub fn field(label: &str, value: impl std::fmt::Display) {
        println!(
            "  {:<18} {}",
            format!("{}:", label).if_supports_color(Stream::Stdout, |t| t.dimmed()),
            value
        );
    }
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// One-line rendering of a validation issue
pub fn issue_line(issue: &ValidationIssue) -> String {
    let mut line = format!("{}: {}", issue.field, issue.message);
    match (&issue.expected, &issue.actual) {
        (Some(expected), Some(actual)) => {
            line.push_str(&format!(" (expected {}, found {})", expected, actual));
        }
        (Some(expected), None) => line.push_str(&format!(" (expected {})", expected)),
        (None, Some(actual)) => line.push_str(&format!(" (found {})", actual)),
        (None, None) => {}
    }
    line.push_str(&format!(" [{}]", issue.code));
    line
}

/// Print fatal issues followed by warnings
pub fn print_issues(errors: &[ValidationIssue], warnings: &[ValidationIssue]) {
    for issue in errors {
        Status::error(&issue_line(issue));
    }
    for issue in warnings {
        Status::warning(&issue_line(issue));
    }
}

/// Print an error with its context and suggestion
pub fn print_error(error: &Error) {
    Status::error(&format!("[{}] {}", error.code, error.message));
    if let Some(context) = &error.context {
        for line in context.lines() {
            eprintln!("    {}", line);
        }
    }
    if let Some(suggestion) = &error.suggestion {
        eprintln!(
            "  {} {}",
            "hint:".if_supports_color(Stream::Stderr, |t| t.cyan()),
            suggestion
        );
    }
}
