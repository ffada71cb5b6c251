//! Field-level validation
//!
//! Provides a fluent builder that accumulates errors and warnings per field:
//! - Required values
//! - Reverse-domain identifiers
//! - Ordered chains such as `min <= target <= compile`
//! - Custom checks and non-blocking warnings
//!
//! # Example
//!
//! ```rust
//! use droidcfg_core::validation::Validator;
//!
//! let result = Validator::new()
//!     .required("application_id", "com.example.app")
//!     .reverse_domain_with_code("application_id", "com.example.app", "INVALID_APPLICATION_ID")
//!     .ordered_with_code("sdk", &[("min", 21), ("target", 34), ("compile", 34)], "SDK_ORDER")
//!     .validate();
//!
//! assert!(result.is_valid());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reverse-domain package identifier: two or more dot-separated segments,
/// each starting with an ASCII letter.
static REVERSE_DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").unwrap());

/// Check whether a value is a reverse-domain identifier such as `com.example.app`
pub fn is_reverse_domain(value: &str) -> bool {
    REVERSE_DOMAIN.is_match(value)
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field that failed validation
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
    /// Expected value (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Actual value (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationError {
    /// Create a finding without expected/actual values
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
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

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
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

    /// No errors and no warnings
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get all warnings
    pub fn warnings(&self) -> &[ValidationError] {
        &self.warnings
    }

    /// Whether any error carries the given code
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Whether any warning carries the given code
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Add an error
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: ValidationError) {
        self.warnings.push(warning);
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
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
                ValidationError::new(field, "REQUIRED", "Field is required")
                    .expected("non-empty value")
                    .actual("empty"),
            );
        }
        self
    }

    /// Validate a reverse-domain identifier, reporting under `code`
    pub fn reverse_domain_with_code(mut self, field: &str, value: &str, code: &str) -> Self {
        if !is_reverse_domain(value) {
            self.result.add_error(
                ValidationError::new(
                    field,
                    code,
                    format!("'{}' is not a valid reverse-domain identifier", value),
                )
                .expected("reverse-domain identifier (e.g. com.example.app)")
                .actual(value),
            );
        }
        self
    }

    /// Validate that named values are non-decreasing in the given order,
    /// reporting each violated pair under `code`
    pub fn ordered_with_code<T: PartialOrd + std::fmt::Display>(
        mut self,
        field: &str,
        chain: &[(&str, T)],
        code: &str,
    ) -> Self {
        let expected = chain
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(" <= ");

        for pair in chain.windows(2) {
            let (lo_name, lo) = &pair[0];
            let (hi_name, hi) = &pair[1];
            if lo > hi {
                self.result.add_error(
                    ValidationError::new(
                        field,
                        code,
                        format!("{} ({}) must not exceed {} ({})", lo_name, lo, hi_name, hi),
                    )
                    .expected(expected.clone())
                    .actual(format!("{} = {}, {} = {}", lo_name, lo, hi_name, hi)),
                );
            }
        }
        self
    }

    /// Add a custom validation
    pub fn custom<F>(mut self, field: &str, code: &str, f: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(message) = f() {
            self.result.add_error(ValidationError::new(field, code, message));
        }
        self
    }

    /// Add a warning (non-blocking)
    pub fn warn_if(mut self, field: &str, code: &str, condition: bool, message: &str) -> Self {
        if condition {
            self.result.add_warning(ValidationError::new(field, code, message));
        }
        self
    }

    /// Record an already-built error
    pub fn error(mut self, error: ValidationError) -> Self {
        self.result.add_error(error);
        self
    }

    /// Record an already-built warning
    pub fn warning(mut self, warning: ValidationError) -> Self {
        self.result.add_warning(warning);
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> ValidationResult {
        self.result
    }
}
