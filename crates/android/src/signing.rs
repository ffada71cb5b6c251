//! Signing profile registry
//!
//! Android always provides a `debug` signing config backed by the
//! auto-generated debug keystore. Additional profiles are declared in the
//! `[signing.profiles]` table of `.droidcfg.toml`.

use droidcfg_core::config::{ProfileKind, SigningConfig};
use serde::Serialize;
use std::collections::BTreeMap;

/// Name of the implicit debug profile
pub const DEBUG_PROFILE: &str = "debug";

/// A named credential set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningProfile {
    /// Profile name referenced by build types
    pub name: String,
    /// Credential kind
    pub kind: ProfileKind,
    /// Keystore path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_file: Option<String>,
    /// Key alias inside the keystore
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
}

impl SigningProfile {
    /// The platform debug profile
    pub fn debug() -> Self {
        Self {
            name: DEBUG_PROFILE.to_string(),
            kind: ProfileKind::Debug,
            store_file: None,
            key_alias: Some("androiddebugkey".to_string()),
        }
    }

    /// Whether this profile signs with development credentials
    pub fn is_debug(&self) -> bool {
        self.kind == ProfileKind::Debug
    }
}

/// Registry of signing profiles known to the build
#[derive(Debug, Clone)]
pub struct SigningRegistry {
    profiles: BTreeMap<String, SigningProfile>,
}

impl Default for SigningRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningRegistry {
    /// Registry containing only the debug profile
    pub fn new() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEBUG_PROFILE.to_string(), SigningProfile::debug());
        Self { profiles }
    }

    /// Registry from configuration, on top of the debug profile
    pub fn from_config(config: &SigningConfig) -> Self {
        let mut registry = Self::new();
        for (name, entry) in &config.profiles {
            let mut kind = entry.kind;
            if name == DEBUG_PROFILE && kind != ProfileKind::Debug {
                tracing::warn!("Ignoring kind override for the debug signing profile");
                kind = ProfileKind::Debug;
            }
            registry.register(SigningProfile {
                name: name.clone(),
                kind,
                store_file: entry.store_file.clone(),
                key_alias: entry.key_alias.clone(),
            });
        }
        registry
    }

    /// Add or replace a profile
    pub fn register(&mut self, profile: SigningProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Whether a profile with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Look up a profile
    pub fn get(&self, name: &str) -> Option<&SigningProfile> {
        self.profiles.get(name)
    }

    /// Whether the named profile exists and holds debug credentials
    pub fn is_debug(&self, name: &str) -> bool {
        self.get(name).is_some_and(SigningProfile::is_debug)
    }

    /// Profile names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
