//! Android build descriptor tooling
//!
//! This crate models the Android packaging layer of a Flutter application:
//! - Build descriptor model with TOML/JSON serialization
//! - Provider traits resolving `flutter.*` tokens
//! - Signing profile registry
//! - Descriptor validation and signing policy
//! - Gradle Kotlin DSL import and export

#![warn(missing_docs)]

pub mod descriptor;
pub mod gradle;
pub mod providers;
pub mod signing;
pub mod validate;

pub use descriptor::{BuildDescriptor, DescriptorFormat, Resolvable, ResolvedDescriptor};
pub use signing::{SigningProfile, SigningRegistry};
pub use validate::DescriptorValidator;
