//! Configuration schema definitions
//!
//! Tool configuration describing the external collaborators a descriptor
//! depends on: SDK levels, version manifest, signing profiles and policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigSchema {
    /// Project paths
    #[serde(default)]
    pub general: GeneralConfig,

    /// SDK provider values
    #[serde(default)]
    pub sdk: SdkConfig,

    /// Version provider fallback
    #[serde(default)]
    pub version: VersionConfig,

    /// Signing profiles
    #[serde(default)]
    pub signing: SigningConfig,

    /// Validation policy
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// General project configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Default descriptor path used when a command is given none
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Flutter pubspec supplying versionName/versionCode
    #[serde(default = "default_pubspec")]
    pub pubspec: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            pubspec: default_pubspec(),
        }
    }
}

fn default_descriptor() -> String {
    "android/app/descriptor.toml".to_string()
}

fn default_pubspec() -> String {
    "pubspec.yaml".to_string()
}

/// SDK levels supplied for `flutter.*SdkVersion` tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SdkConfig {
    /// `flutter.compileSdkVersion`
    #[serde(default = "default_compile_sdk")]
    pub compile: u32,

    /// `flutter.minSdkVersion`
    #[serde(default = "default_min_sdk")]
    pub min: u32,

    /// `flutter.targetSdkVersion`
    #[serde(default = "default_target_sdk")]
    pub target: u32,

    /// `flutter.ndkVersion`
    #[serde(default = "default_ndk")]
    pub ndk: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            compile: default_compile_sdk(),
            min: default_min_sdk(),
            target: default_target_sdk(),
            ndk: default_ndk(),
        }
    }
}

/// Default `flutter.compileSdkVersion`, as set by the Flutter Gradle plugin
pub const DEFAULT_COMPILE_SDK: u32 = 35;
/// Default `flutter.minSdkVersion`
pub const DEFAULT_MIN_SDK: u32 = 21;
/// Default `flutter.targetSdkVersion`
pub const DEFAULT_TARGET_SDK: u32 = 35;
/// Default `flutter.ndkVersion`
pub const DEFAULT_NDK: &str = "27.0.12077973";

fn default_compile_sdk() -> u32 {
    DEFAULT_COMPILE_SDK
}

fn default_min_sdk() -> u32 {
    DEFAULT_MIN_SDK
}

fn default_target_sdk() -> u32 {
    DEFAULT_TARGET_SDK
}

fn default_ndk() -> String {
    DEFAULT_NDK.to_string()
}

/// Fallback version identifiers, used when no pubspec is present
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionConfig {
    /// `flutter.versionCode`
    #[serde(default = "default_version_code")]
    pub code: u32,

    /// `flutter.versionName`
    #[serde(default = "default_version_name")]
    pub name: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            code: default_version_code(),
            name: default_version_name(),
        }
    }
}

fn default_version_code() -> u32 {
    1
}

fn default_version_name() -> String {
    "1.0.0".to_string()
}

/// Signing profile registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SigningConfig {
    /// Named profiles in addition to the implicit `debug` profile
    #[serde(default)]
    pub profiles: BTreeMap<String, SigningProfileConfig>,
}

/// A single signing profile entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningProfileConfig {
    /// Credential kind; release unless stated
    #[serde(default)]
    pub kind: ProfileKind,

    /// Keystore path
    #[serde(default)]
    pub store_file: Option<String>,

    /// Key alias inside the keystore
    #[serde(default)]
    pub key_alias: Option<String>,
}

/// Whether a profile carries development or distribution credentials
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Development credentials
    Debug,
    /// Distribution credentials
    #[default]
    Release,
}

/// Validation policy
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PolicyConfig {
    /// How to report a release build type signed with a debug profile
    #[serde(default)]
    pub release_debug_signing: PolicyLevel,
}

/// Severity assigned to a policy finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    /// Not reported
    Allow,
    /// Reported as a warning
    #[default]
    Warn,
    /// Reported as an error
    Deny,
}
