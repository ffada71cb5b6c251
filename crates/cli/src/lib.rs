//! CLI utilities for droidcfg
//!
//! Provides shared CLI functionality:
//! - Status messages
//! - Validation finding reports

#![warn(missing_docs)]

pub mod output;
