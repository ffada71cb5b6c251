//! Build descriptor model
//!
//! A [`BuildDescriptor`] is the static record an external build engine reads
//! to package the Android embedding of a Flutter application: identifiers,
//! SDK window, language levels, desugaring, signing and manifest
//! placeholders. Values owned by external providers (the Flutter Gradle
//! plugin, the pubspec) are kept as tokens until [`BuildDescriptor::resolve`].

use crate::gradle;
use crate::providers::{self, SdkProvider, VersionProvider};
use droidcfg_core::error::{Error, ErrorCode, Result, ResultExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

static TOKEN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*(\(\))?$").unwrap());

/// Whether `name` can be written as a bare Kotlin DSL reference.
///
/// Tokens are dotted identifiers, optionally ending in a call such as
/// `flutter.versionCode()`. Boolean keywords are excluded since they read
/// back as literals.
pub fn is_valid_token(name: &str) -> bool {
    TOKEN_NAME.is_match(name) && !matches!(name, "true" | "false")
}

/// A value that is either written literally or supplied by a provider token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolvable<T> {
    /// Concrete value
    Literal(T),
    /// Provider token such as `flutter.minSdkVersion`
    Token {
        /// Token name
        from: String,
    },
}

impl<T> Resolvable<T> {
    /// Build a token reference
    pub fn token(name: impl Into<String>) -> Self {
        Self::Token { from: name.into() }
    }

    /// Token name, if this value is provider-supplied
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Token { from } => Some(from),
        }
    }
}

impl<T: Clone> Resolvable<T> {
    /// Resolve through `lookup`, failing with an unresolved-reference error
    pub fn resolve_with(&self, lookup: impl FnOnce(&str) -> Option<T>) -> Result<T> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Token { from } => lookup(from).ok_or_else(|| Error::unresolved(from)),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::Token { from } => write!(f, "<{}>", from),
        }
    }
}

/// SDK compatibility window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBounds {
    /// SDK the sources are compiled against
    pub compile: Resolvable<u32>,
    /// Lowest supported platform level
    pub min: Resolvable<u32>,
    /// Platform level the app is tested against
    pub target: Resolvable<u32>,
    /// NDK version for native builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndk: Option<Resolvable<String>>,
}

/// Version identifiers from the shared manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Monotonic store version code
    pub code: Resolvable<u32>,
    /// User-visible version name
    pub name: Resolvable<String>,
}

/// Source, target and runtime language levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCompatibility {
    /// Java source compatibility
    #[serde(default = "default_language_level")]
    pub source: String,
    /// Java target compatibility
    #[serde(default = "default_language_level")]
    pub target: String,
    /// Kotlin JVM target
    #[serde(default = "default_language_level")]
    pub jvm_target: String,
}

impl Default for LanguageCompatibility {
    fn default() -> Self {
        Self {
            source: default_language_level(),
            target: default_language_level(),
            jvm_target: default_language_level(),
        }
    }
}

fn default_language_level() -> String {
    "17".to_string()
}

/// Core library desugaring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desugaring {
    /// Whether `isCoreLibraryDesugaringEnabled` is set
    #[serde(default)]
    pub enabled: bool,
    /// Desugaring library coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// A Maven coordinate of the form `group:artifact:version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCoordinate {
    /// Group id
    pub group: String,
    /// Artifact id
    pub artifact: String,
    /// Version
    pub version: String,
}

impl FromStr for LibraryCoordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    group: (*group).to_string(),
                    artifact: (*artifact).to_string(),
                    version: (*version).to_string(),
                })
            }
            _ => Err(Error::new(
                ErrorCode::InvalidFormat,
                format!("Invalid library coordinate: {}", s),
            )
            .with_suggestion("Use the form group:artifact:version")),
        }
    }
}

impl fmt::Display for LibraryCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

fn default_source_root() -> String {
    "../..".to_string()
}

/// Static build-target configuration for the Android packaging layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Store package identifier
    pub application_id: String,

    /// Code namespace; the application id is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Relative path to the shared Flutter source tree
    #[serde(default = "default_source_root")]
    pub source_root: String,

    /// Gradle plugins, in application order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    /// SDK compatibility window
    pub sdk: SdkBounds,

    /// Version identifiers
    pub version: VersionInfo,

    /// Language levels
    #[serde(default)]
    pub language: LanguageCompatibility,

    /// Core library desugaring
    #[serde(default)]
    pub desugaring: Desugaring,

    /// Build type name to signing profile name
    #[serde(default)]
    pub signing: BTreeMap<String, String>,

    /// Manifest placeholder substitutions
    #[serde(default)]
    pub manifest_placeholders: BTreeMap<String, String>,
}

impl BuildDescriptor {
    /// Descriptor of the college_admin Android embedding.
    ///
    /// The release build type reuses the debug signing profile, exactly as
    /// the project's Gradle file does. Validation reports this.
    pub fn college_admin() -> Self {
        Self {
            application_id: "com.eschool.college_admin".to_string(),
            namespace: Some("com.eschool.college_admin".to_string()),
            source_root: default_source_root(),
            plugins: vec![
                "com.android.application".to_string(),
                "kotlin-android".to_string(),
                "dev.flutter.flutter-gradle-plugin".to_string(),
            ],
            sdk: SdkBounds {
                compile: Resolvable::token(providers::FLUTTER_COMPILE_SDK),
                min: Resolvable::token(providers::FLUTTER_MIN_SDK),
                target: Resolvable::token(providers::FLUTTER_TARGET_SDK),
                ndk: Some(Resolvable::token(providers::FLUTTER_NDK)),
            },
            version: VersionInfo {
                code: Resolvable::token(providers::FLUTTER_VERSION_CODE),
                name: Resolvable::token(providers::FLUTTER_VERSION_NAME),
            },
            language: LanguageCompatibility::default(),
            desugaring: Desugaring {
                enabled: true,
                library: Some("com.android.tools:desugar_jdk_libs:2.1.4".to_string()),
            },
            signing: BTreeMap::from([("release".to_string(), "debug".to_string())]),
            manifest_placeholders: BTreeMap::from([(
                "applicationName".to_string(),
                "android.app.Application".to_string(),
            )]),
        }
    }

    /// Namespace in effect for code generation
    pub fn effective_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.application_id)
    }

    /// Signing profile applied to a build type
    pub fn signing_profile_for(&self, build_type: &str) -> Option<&str> {
        self.signing.get(build_type).map(String::as_str)
    }

    /// Substitution value for a manifest placeholder
    pub fn placeholder(&self, name: &str) -> Option<&str> {
        self.manifest_placeholders.get(name).map(String::as_str)
    }

    /// Parsed desugaring library coordinate, if one is declared
    pub fn desugaring_library(&self) -> Option<Result<LibraryCoordinate>> {
        self.desugaring.library.as_deref().map(str::parse)
    }

    /// Every provider token referenced, with the field it appears in
    pub fn tokens(&self) -> Vec<(&'static str, &str)> {
        let mut tokens = Vec::new();
        let fields: [(&'static str, Option<&str>); 6] = [
            ("sdk.compile", self.sdk.compile.as_token()),
            ("sdk.min", self.sdk.min.as_token()),
            ("sdk.target", self.sdk.target.as_token()),
            ("sdk.ndk", self.sdk.ndk.as_ref().and_then(Resolvable::as_token)),
            ("version.code", self.version.code.as_token()),
            ("version.name", self.version.name.as_token()),
        ];
        for (field, token) in fields {
            if let Some(token) = token {
                tokens.push((field, token));
            }
        }
        tokens
    }

    /// Replace every token with the value its provider supplies
    pub fn resolve(
        &self,
        sdk: &dyn SdkProvider,
        version: &dyn VersionProvider,
    ) -> Result<ResolvedDescriptor> {
        let resolved_sdk = ResolvedSdk {
            compile: self
                .sdk
                .compile
                .resolve_with(|t| sdk.sdk_level(t))
                .context("Resolving sdk.compile")?,
            min: self
                .sdk
                .min
                .resolve_with(|t| sdk.sdk_level(t))
                .context("Resolving sdk.min")?,
            target: self
                .sdk
                .target
                .resolve_with(|t| sdk.sdk_level(t))
                .context("Resolving sdk.target")?,
            ndk: self
                .sdk
                .ndk
                .as_ref()
                .map(|ndk| ndk.resolve_with(|t| sdk.ndk_version(t)))
                .transpose()
                .context("Resolving sdk.ndk")?,
        };

        let resolved_version = ResolvedVersion {
            code: self
                .version
                .code
                .resolve_with(|t| version.version_code(t))
                .context("Resolving version.code")?,
            name: self
                .version
                .name
                .resolve_with(|t| version.version_name(t))
                .context("Resolving version.name")?,
        };

        tracing::debug!(
            application_id = %self.application_id,
            compile = resolved_sdk.compile,
            min = resolved_sdk.min,
            target = resolved_sdk.target,
            version = %resolved_version.name,
            "Descriptor resolved"
        );

        Ok(ResolvedDescriptor {
            application_id: self.application_id.clone(),
            namespace: self.effective_namespace().to_string(),
            source_root: self.source_root.clone(),
            sdk: resolved_sdk,
            version: resolved_version,
            language: self.language.clone(),
            desugaring: self.desugaring.clone(),
            signing: self.signing.clone(),
            manifest_placeholders: self.manifest_placeholders.clone(),
        })
    }

    /// Parse a TOML descriptor
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON descriptor
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse content in the given format
    pub fn parse(content: &str, format: DescriptorFormat) -> Result<Self> {
        match format {
            DescriptorFormat::Toml => Self::from_toml_str(content),
            DescriptorFormat::Json => Self::from_json_str(content),
            DescriptorFormat::Kotlin => gradle::parse_kts(content),
        }
    }

    /// Render in the given format
    pub fn render(&self, format: DescriptorFormat) -> Result<String> {
        match format {
            DescriptorFormat::Toml => self.to_toml_string(),
            DescriptorFormat::Json => self.to_json_string(),
            DescriptorFormat::Kotlin => gradle::render_kts(self),
        }
    }

    /// Load a descriptor, choosing the format from the file name
    pub fn load(path: &Path) -> Result<Self> {
        let format = DescriptorFormat::from_path(path)?;
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), ?format, "Loading descriptor");
        Self::parse(&content, format).context(format!("Loading {}", path.display()))
    }

    /// Write a descriptor, choosing the format from the file name
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = DescriptorFormat::from_path(path)?;
        let content = self.render(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), ?format, "Descriptor written");
        Ok(())
    }
}

/// Serialization formats a descriptor can be read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    /// TOML descriptor
    Toml,
    /// JSON descriptor
    Json,
    /// Gradle Kotlin DSL (`build.gradle.kts`)
    Kotlin,
}

impl DescriptorFormat {
    /// Detect the format from a file name
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some("kts") => Ok(Self::Kotlin),
            _ => Err(Error::unsupported_format(path)),
        }
    }
}

impl FromStr for DescriptorFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "kts" | "kotlin" | "gradle" => Ok(Self::Kotlin),
            other => Err(Error::new(
                ErrorCode::InvalidInput,
                format!("Unknown format: {}", other),
            )
            .with_suggestion("Use one of: toml, json, kts")),
        }
    }
}

/// Resolved SDK levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSdk {
    /// Compile SDK level
    pub compile: u32,
    /// Minimum supported SDK level
    pub min: u32,
    /// Target SDK level
    pub target: u32,
    /// NDK version, when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndk: Option<String>,
}

/// Resolved version identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Monotonic build number
    pub code: u32,
    /// User-visible version
    pub name: String,
}

/// A descriptor with every provider token replaced by a concrete value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDescriptor {
    /// Store package identifier
    pub application_id: String,
    /// Effective code namespace
    pub namespace: String,
    /// Relative path to the shared Flutter source tree
    pub source_root: String,
    /// SDK compatibility window
    pub sdk: ResolvedSdk,
    /// Version identifiers
    pub version: ResolvedVersion,
    /// Language levels
    pub language: LanguageCompatibility,
    /// Core library desugaring
    pub desugaring: Desugaring,
    /// Build type name to signing profile name
    pub signing: BTreeMap<String, String>,
    /// Manifest placeholder substitutions
    pub manifest_placeholders: BTreeMap<String, String>,
}
