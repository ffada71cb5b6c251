//! Terminal output utilities
//!
//! Provides consistent formatting for CLI output.

use droidcfg_core::validation::{ValidationError, ValidationResult};
use owo_colors::{OwoColorize, Stream};

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!(
            "{} {}",
            "✓".if_supports_color(Stream::Stdout, |t| t.green()),
            message
        );
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!(
            "{} {}",
            "✗".if_supports_color(Stream::Stderr, |t| t.red()),
            message
        );
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!(
            "{} {}",
            "⚠".if_supports_color(Stream::Stderr, |t| t.yellow()),
            message
        );
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!(
            "{} {}",
            "ℹ".if_supports_color(Stream::Stdout, |t| t.blue()),
            message
        );
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.if_supports_color(Stream::Stdout, |t| t.bold()));
        println!("{}", "─".repeat(message.chars().count()));
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

/// One-line rendering of a finding, without colors
pub fn format_finding(finding: &ValidationError) -> String {
    let mut line = format!("[{}] {}: {}", finding.code, finding.field, finding.message);
    match (&finding.expected, &finding.actual) {
        (Some(expected), Some(actual)) => {
            line.push_str(&format!(" (expected {}, got {})", expected, actual));
        }
        (None, Some(actual)) => line.push_str(&format!(" (got {})", actual)),
        (Some(expected), None) => line.push_str(&format!(" (expected {})", expected)),
        (None, None) => {}
    }
    line
}

/// Print every error and warning followed by a summary line
pub fn print_validation(subject: &str, result: &ValidationResult) {
    for error in result.errors() {
        Status::error(&format_finding(error));
    }
    for warning in result.warnings() {
        Status::warning(&format_finding(warning));
    }

    let summary = format!(
        "{}: {}, {}",
        subject,
        format_count(result.errors().len(), "error", "errors"),
        format_count(result.warnings().len(), "warning", "warnings")
    );
    if result.is_valid() {
        Status::success(&summary);
    } else {
        Status::error(&summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count_singular() {
        assert_eq!(format_count(1, "error", "errors"), "1 error");
    }

    #[test]
    fn test_format_count_plural() {
        assert_eq!(format_count(0, "warning", "warnings"), "0 warnings");
    }

    #[test]
    fn test_format_finding_with_values() {
        let finding = ValidationError::new("sdk", "SDK_ORDER", "min (35) must not exceed target (34)")
            .expected("min <= target <= compile")
            .actual("min = 35, target = 34");
        assert_eq!(
            format_finding(&finding),
            "[SDK_ORDER] sdk: min (35) must not exceed target (34) (expected min <= target <= compile, got min = 35, target = 34)"
        );
    }

    #[test]
    fn test_format_finding_bare() {
        let finding = ValidationError::new("plugins", "PLUGIN_ORDER", "out of order");
        assert_eq!(format_finding(&finding), "[PLUGIN_ORDER] plugins: out of order");
    }
}
