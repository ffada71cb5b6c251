//! External value providers
//!
//! SDK levels and version identifiers are owned by collaborators outside the
//! descriptor: the Flutter Gradle plugin and the app's `pubspec.yaml`. These
//! traits let the descriptor resolve its tokens without knowing where the
//! values come from.

use droidcfg_core::config::{Config, SdkConfig, VersionConfig};
use droidcfg_core::error::{Error, Result, ResultExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Token for the compile SDK supplied by the Flutter Gradle plugin
pub const FLUTTER_COMPILE_SDK: &str = "flutter.compileSdkVersion";
/// Token for the minimum SDK
pub const FLUTTER_MIN_SDK: &str = "flutter.minSdkVersion";
/// Token for the target SDK
pub const FLUTTER_TARGET_SDK: &str = "flutter.targetSdkVersion";
/// Token for the NDK version
pub const FLUTTER_NDK: &str = "flutter.ndkVersion";
/// Token for the version code taken from the pubspec build number
pub const FLUTTER_VERSION_CODE: &str = "flutter.versionCode";
/// Token for the version name taken from the pubspec version
pub const FLUTTER_VERSION_NAME: &str = "flutter.versionName";

/// Supplies SDK levels and NDK versions for tokens
pub trait SdkProvider {
    /// SDK level for a token such as `flutter.minSdkVersion`
    fn sdk_level(&self, token: &str) -> Option<u32>;

    /// NDK version for a token such as `flutter.ndkVersion`
    fn ndk_version(&self, token: &str) -> Option<String>;
}

/// Supplies version identifiers for tokens
pub trait VersionProvider {
    /// Version code for a token such as `flutter.versionCode`
    fn version_code(&self, token: &str) -> Option<u32>;

    /// Version name for a token such as `flutter.versionName`
    fn version_name(&self, token: &str) -> Option<String>;
}

/// SDK provider backed by fixed values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSdkProvider {
    compile: u32,
    min: u32,
    target: u32,
    ndk: String,
}

impl StaticSdkProvider {
    /// Build from the `[sdk]` configuration table
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            compile: config.compile,
            min: config.min,
            target: config.target,
            ndk: config.ndk.clone(),
        }
    }
}

impl Default for StaticSdkProvider {
    fn default() -> Self {
        Self::from_config(&SdkConfig::default())
    }
}

impl SdkProvider for StaticSdkProvider {
    fn sdk_level(&self, token: &str) -> Option<u32> {
        match token {
            FLUTTER_COMPILE_SDK => Some(self.compile),
            FLUTTER_MIN_SDK => Some(self.min),
            FLUTTER_TARGET_SDK => Some(self.target),
            _ => None,
        }
    }

    fn ndk_version(&self, token: &str) -> Option<String> {
        (token == FLUTTER_NDK).then(|| self.ndk.clone())
    }
}

/// Version provider backed by fixed values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticVersionProvider {
    code: u32,
    name: String,
}

impl StaticVersionProvider {
    /// Build from the `[version]` configuration table
    pub fn from_config(config: &VersionConfig) -> Self {
        Self {
            code: config.code,
            name: config.name.clone(),
        }
    }
}

impl VersionProvider for StaticVersionProvider {
    fn version_code(&self, token: &str) -> Option<u32> {
        (token == FLUTTER_VERSION_CODE).then_some(self.code)
    }

    fn version_name(&self, token: &str) -> Option<String> {
        (token == FLUTTER_VERSION_NAME).then(|| self.name.clone())
    }
}

static PUBSPEC_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^version:\s*["']?([^\s"'+#]+)(?:\+([^\s"'#]+))?["']?\s*(?:#.*)?$"#).unwrap()
});

/// Version provider reading the `version: <name>+<code>` line of a pubspec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubspecVersionProvider {
    name: String,
    code: u32,
}

impl PubspecVersionProvider {
    /// Parse pubspec content
    pub fn parse(content: &str) -> Result<Self> {
        let caps = PUBSPEC_VERSION.captures(content).ok_or_else(|| {
            Error::parse("pubspec has no version entry")
                .with_suggestion("Add a line such as `version: 1.0.0+1` to pubspec.yaml")
        })?;

        let name = caps[1].to_string();
        let code = match caps.get(2) {
            Some(build) => build.as_str().parse::<u32>().map_err(|e| {
                Error::parse(format!("Invalid build number '{}' in pubspec version", build.as_str()))
                    .with_source(e)
            })?,
            // Flutter's default when the version carries no build number
            None => 1,
        };

        Ok(Self { name, code })
    }

    /// Read and parse a pubspec file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).context(format!("Reading {}", path.display()))
    }
}

impl VersionProvider for PubspecVersionProvider {
    fn version_code(&self, token: &str) -> Option<u32> {
        (token == FLUTTER_VERSION_CODE).then_some(self.code)
    }

    fn version_name(&self, token: &str) -> Option<String> {
        (token == FLUTTER_VERSION_NAME).then(|| self.name.clone())
    }
}

/// SDK provider for a loaded configuration
pub fn sdk_provider_for(config: &Config) -> StaticSdkProvider {
    StaticSdkProvider::from_config(&config.schema.sdk)
}

/// Version provider for a loaded configuration.
///
/// Prefers the pubspec named in `[general]` (relative to the config file),
/// falling back to the `[version]` table when it does not exist.
pub fn version_provider_for(config: &Config) -> Result<Box<dyn VersionProvider>> {
    let pubspec = config.base_dir().join(&config.schema.general.pubspec);
    if pubspec.is_file() {
        tracing::debug!(path = %pubspec.display(), "Using pubspec version provider");
        Ok(Box::new(PubspecVersionProvider::load(&pubspec)?))
    } else {
        tracing::debug!("No pubspec found, using [version] configuration");
        Ok(Box::new(StaticVersionProvider::from_config(
            &config.schema.version,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidcfg_core::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_static_sdk_provider() {
        let provider = StaticSdkProvider::default();
        assert_eq!(provider.sdk_level(FLUTTER_MIN_SDK), Some(21));
        assert_eq!(provider.sdk_level(FLUTTER_COMPILE_SDK), Some(35));
        assert_eq!(provider.sdk_level("flutter.unknown"), None);
        assert_eq!(provider.ndk_version(FLUTTER_NDK).as_deref(), Some("27.0.12077973"));
        assert_eq!(provider.ndk_version(FLUTTER_MIN_SDK), None);
    }

    #[test]
    fn test_static_version_provider() {
        let provider = StaticVersionProvider::from_config(&VersionConfig::default());
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(1));
        assert_eq!(provider.version_name(FLUTTER_VERSION_NAME).as_deref(), Some("1.0.0"));
        assert_eq!(provider.version_name(FLUTTER_VERSION_CODE), None);
    }

    #[test]
    fn test_pubspec_with_build_number() {
        let pubspec = "name: college_admin\ndescription: Admin app\nversion: 2.4.1+37\n\nenvironment:\n  sdk: '>=3.0.0 <4.0.0'\n";
        let provider = PubspecVersionProvider::parse(pubspec).unwrap();
        assert_eq!(provider.version_name(FLUTTER_VERSION_NAME).as_deref(), Some("2.4.1"));
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(37));
    }

    #[test]
    fn test_pubspec_without_build_number() {
        let provider = PubspecVersionProvider::parse("name: app\nversion: \"1.2.0\" # release\n").unwrap();
        assert_eq!(provider.version_name(FLUTTER_VERSION_NAME).as_deref(), Some("1.2.0"));
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(1));
    }

    #[test]
    fn test_pubspec_ignores_nested_version_keys() {
        let pubspec = "name: app\ndependencies:\n  foo:\n    version: 9.9.9\nversion: 1.0.0+4\n";
        let provider = PubspecVersionProvider::parse(pubspec).unwrap();
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(4));
    }

    #[test]
    fn test_pubspec_missing_version() {
        let err = PubspecVersionProvider::parse("name: app\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_pubspec_bad_build_number() {
        let err = PubspecVersionProvider::parse("version: 1.0.0+beta\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
        assert!(err.message.contains("beta"));
    }

    #[test]
    fn test_version_provider_prefers_pubspec() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".droidcfg.toml");
        std::fs::write(&config_path, "[version]\ncode = 99\n").unwrap();
        let mut pubspec = std::fs::File::create(dir.path().join("pubspec.yaml")).unwrap();
        writeln!(pubspec, "name: app\nversion: 3.0.0+12").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        let provider = version_provider_for(&config).unwrap();
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(12));
    }

    #[test]
    fn test_version_provider_falls_back_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".droidcfg.toml");
        std::fs::write(&config_path, "[version]\ncode = 99\nname = \"0.9.0\"\n").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        let provider = version_provider_for(&config).unwrap();
        assert_eq!(provider.version_code(FLUTTER_VERSION_CODE), Some(99));
        assert_eq!(provider.version_name(FLUTTER_VERSION_NAME).as_deref(), Some("0.9.0"));
    }
}
