//! Core utilities for droidcfg build descriptor tooling
//!
//! This crate provides shared functionality used by the descriptor model and
//! the command-line front end:
//!
//! - **Error handling**: Errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based tool configuration with defaults
//! - **Validation**: Fluent field validator accumulating errors and warnings
//!
//! # Example
//!
//! ```rust,no_run
//! use droidcfg_core::config::Config;
//! use droidcfg_core::validation::Validator;
//!
//! let config = Config::load(None).expect("invalid .droidcfg.toml");
//!
//! let result = Validator::new()
//!     .ordered_with_code(
//!         "sdk",
//!         &[
//!             ("min", config.schema.sdk.min),
//!             ("target", config.schema.sdk.target),
//!             ("compile", config.schema.sdk.compile),
//!         ],
//!         "SDK_ORDER",
//!     )
//!     .validate();
//!
//! if !result.is_valid() {
//!     eprintln!("Configured SDK levels are out of order");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod validation;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema, PolicyLevel, ProfileKind};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::validation::{ValidationError, ValidationResult, Validator};
}
