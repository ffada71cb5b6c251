//! Descriptor validation
//!
//! Checks a [`BuildDescriptor`] against the rules an external build engine
//! would otherwise reject at build time, plus the signing policy risk of
//! shipping a release artifact signed with development credentials.
//!
//! Validation never modifies the descriptor. Findings are split into errors
//! (the build must not proceed) and warnings.

use crate::descriptor::{is_valid_token, BuildDescriptor, Resolvable};
use crate::providers::{SdkProvider, VersionProvider};
use crate::signing::SigningRegistry;
use droidcfg_core::config::{PolicyConfig, PolicyLevel};
use droidcfg_core::validation::{ValidationError, ValidationResult, Validator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Finding codes reported by [`DescriptorValidator`]
pub mod codes {
    /// Application id is not a reverse-domain name
    pub const INVALID_APPLICATION_ID: &str = "INVALID_APPLICATION_ID";
    /// Namespace is not a reverse-domain name
    pub const INVALID_NAMESPACE: &str = "INVALID_NAMESPACE";
    /// SDK levels break `min <= target <= compile`
    pub const SDK_ORDER: &str = "SDK_ORDER";
    /// No provider supplies a token
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    /// Token is not a dotted identifier and cannot be written to a build file
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    /// Build type names an unregistered signing profile
    pub const UNKNOWN_SIGNING_PROFILE: &str = "UNKNOWN_SIGNING_PROFILE";
    /// Release build type signs with the debug profile
    pub const RELEASE_USES_DEBUG_SIGNING: &str = "RELEASE_USES_DEBUG_SIGNING";
    /// Desugaring is enabled without a library
    pub const DESUGARING_LIBRARY_MISSING: &str = "DESUGARING_LIBRARY_MISSING";
    /// Desugaring library is set while desugaring is off
    pub const DESUGARING_LIBRARY_UNUSED: &str = "DESUGARING_LIBRARY_UNUSED";
    /// Library is not a `group:artifact:version` coordinate
    pub const INVALID_COORDINATE: &str = "INVALID_COORDINATE";
    /// Kotlin JVM target differs from the Java target level
    pub const JVM_TARGET_MISMATCH: &str = "JVM_TARGET_MISMATCH";
    /// Version code is zero
    pub const INVALID_VERSION_CODE: &str = "INVALID_VERSION_CODE";
    /// Manifest placeholder name is not an identifier
    pub const INVALID_PLACEHOLDER: &str = "INVALID_PLACEHOLDER";
    /// Flutter source root is an absolute path
    pub const ABSOLUTE_SOURCE_ROOT: &str = "ABSOLUTE_SOURCE_ROOT";
    /// Flutter plugin is applied before the platform plugins
    pub const PLUGIN_ORDER: &str = "PLUGIN_ORDER";
}

/// Build type whose signing is subject to the debug-credential policy
pub const RELEASE_BUILD_TYPE: &str = "release";

const FLUTTER_PLUGIN: &str = "dev.flutter.flutter-gradle-plugin";
const PLATFORM_PLUGINS: &[&str] = &[
    "com.android.application",
    "kotlin-android",
    "org.jetbrains.kotlin.android",
];

static PLACEHOLDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validates descriptors against a signing registry and policy
pub struct DescriptorValidator<'a> {
    registry: &'a SigningRegistry,
    policy: &'a PolicyConfig,
}

impl<'a> DescriptorValidator<'a> {
    /// Create a validator
    pub fn new(registry: &'a SigningRegistry, policy: &'a PolicyConfig) -> Self {
        Self { registry, policy }
    }

    /// Run every check, resolving provider tokens along the way
    pub fn validate(
        &self,
        descriptor: &BuildDescriptor,
        sdk: &dyn SdkProvider,
        version: &dyn VersionProvider,
    ) -> ValidationResult {
        let mut result = check_identity(descriptor);
        result.merge(check_tokens(descriptor));
        result.merge(check_sdk(descriptor, sdk));
        result.merge(check_version(descriptor, version));
        result.merge(check_language(descriptor));
        result.merge(check_desugaring(descriptor));
        result.merge(self.check_signing(descriptor));
        result.merge(check_manifest_placeholders(descriptor));
        result.merge(check_layout(descriptor));

        tracing::debug!(
            application_id = %descriptor.application_id,
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            "Descriptor validated"
        );
        result
    }

    fn check_signing(&self, descriptor: &BuildDescriptor) -> ValidationResult {
        let mut validator = Validator::new();

        for (build_type, profile) in &descriptor.signing {
            let field = format!("signing.{}", build_type);
            if !self.registry.contains(profile) {
                validator = validator.error(
                    ValidationError::new(
                        &field,
                        codes::UNKNOWN_SIGNING_PROFILE,
                        format!("Signing profile '{}' is not registered", profile),
                    )
                    .expected(self.registry.names().collect::<Vec<_>>().join(", "))
                    .actual(profile.as_str()),
                );
            }
        }

        if let Some(profile) = descriptor.signing_profile_for(RELEASE_BUILD_TYPE) {
            if self.registry.is_debug(profile) {
                let finding = ValidationError::new(
                    "signing.release",
                    codes::RELEASE_USES_DEBUG_SIGNING,
                    format!(
                        "Release builds are signed with the '{}' profile, which holds development credentials",
                        profile
                    ),
                )
                .expected("a release signing profile")
                .actual(profile);

                match self.policy.release_debug_signing {
                    PolicyLevel::Allow => {}
                    PolicyLevel::Warn => {
                        tracing::warn!(profile, "Release build type reuses debug signing");
                        validator = validator.warning(finding);
                    }
                    PolicyLevel::Deny => validator = validator.error(finding),
                }
            }
        }

        validator.validate()
    }
}

fn check_identity(descriptor: &BuildDescriptor) -> ValidationResult {
    let mut validator = Validator::new().required("application_id", &descriptor.application_id);
    if !descriptor.application_id.trim().is_empty() {
        validator = validator.reverse_domain_with_code(
            "application_id",
            &descriptor.application_id,
            codes::INVALID_APPLICATION_ID,
        );
    }
    if let Some(namespace) = &descriptor.namespace {
        validator =
            validator.reverse_domain_with_code("namespace", namespace, codes::INVALID_NAMESPACE);
    }
    validator.validate()
}

fn check_tokens(descriptor: &BuildDescriptor) -> ValidationResult {
    let mut validator = Validator::new();
    for (field, token) in descriptor.tokens() {
        if !is_valid_token(token) {
            validator = validator.error(
                ValidationError::new(
                    field,
                    codes::INVALID_TOKEN,
                    format!("Token '{}' is not a dotted identifier", token),
                )
                .expected("an identifier such as flutter.minSdkVersion")
                .actual(token),
            );
        }
    }
    validator.validate()
}

fn unresolved(field: &str, token: &str) -> ValidationError {
    ValidationError::new(
        field,
        codes::UNRESOLVED_REFERENCE,
        format!("No provider supplies '{}'", token),
    )
    .actual(token)
}

fn resolve_level(
    field: &str,
    value: &Resolvable<u32>,
    sdk: &dyn SdkProvider,
    validator: Validator,
) -> (Option<u32>, Validator) {
    match value {
        Resolvable::Literal(level) => (Some(*level), validator),
        Resolvable::Token { from } => match sdk.sdk_level(from) {
            Some(level) => {
                tracing::debug!(field, token = %from, level, "Resolved SDK token");
                (Some(level), validator)
            }
            None => (None, validator.error(unresolved(field, from))),
        },
    }
}

fn check_sdk(descriptor: &BuildDescriptor, sdk: &dyn SdkProvider) -> ValidationResult {
    let validator = Validator::new();
    let (compile, validator) = resolve_level("sdk.compile", &descriptor.sdk.compile, sdk, validator);
    let (min, validator) = resolve_level("sdk.min", &descriptor.sdk.min, sdk, validator);
    let (target, mut validator) = resolve_level("sdk.target", &descriptor.sdk.target, sdk, validator);

    if let Some(Resolvable::Token { from }) = &descriptor.sdk.ndk {
        if sdk.ndk_version(from).is_none() {
            validator = validator.error(unresolved("sdk.ndk", from));
        }
    }

    if let (Some(min), Some(target), Some(compile)) = (min, target, compile) {
        validator = validator.ordered_with_code(
            "sdk",
            &[("min", min), ("target", target), ("compile", compile)],
            codes::SDK_ORDER,
        );
    }

    validator.validate()
}

fn check_version(descriptor: &BuildDescriptor, version: &dyn VersionProvider) -> ValidationResult {
    let mut validator = Validator::new();

    let code = match &descriptor.version.code {
        Resolvable::Literal(code) => Some(*code),
        Resolvable::Token { from } => {
            let code = version.version_code(from);
            if code.is_none() {
                validator = validator.error(unresolved("version.code", from));
            }
            code
        }
    };
    if code == Some(0) {
        validator = validator.error(
            ValidationError::new(
                "version.code",
                codes::INVALID_VERSION_CODE,
                "Version code must be a positive integer",
            )
            .expected(">= 1")
            .actual("0"),
        );
    }

    match &descriptor.version.name {
        Resolvable::Literal(name) => validator = validator.required("version.name", name),
        Resolvable::Token { from } => match version.version_name(from) {
            Some(name) => validator = validator.required("version.name", &name),
            None => validator = validator.error(unresolved("version.name", from)),
        },
    }

    validator.validate()
}

fn check_language(descriptor: &BuildDescriptor) -> ValidationResult {
    let language = &descriptor.language;
    Validator::new()
        .required("language.source", &language.source)
        .required("language.target", &language.target)
        .required("language.jvm_target", &language.jvm_target)
        .warn_if(
            "language.jvm_target",
            codes::JVM_TARGET_MISMATCH,
            language.jvm_target != language.target,
            "Kotlin jvmTarget differs from Java targetCompatibility",
        )
        .validate()
}

fn check_desugaring(descriptor: &BuildDescriptor) -> ValidationResult {
    let desugaring = &descriptor.desugaring;
    let mut validator = Validator::new()
        .custom("desugaring.library", codes::DESUGARING_LIBRARY_MISSING, || {
            (desugaring.enabled && desugaring.library.is_none()).then(|| {
                "Core library desugaring is enabled but no desugaring library is declared"
                    .to_string()
            })
        })
        .warn_if(
            "desugaring.library",
            codes::DESUGARING_LIBRARY_UNUSED,
            !desugaring.enabled && desugaring.library.is_some(),
            "A desugaring library is declared but desugaring is disabled",
        );

    if let Some(Err(err)) = descriptor.desugaring_library() {
        validator = validator.error(
            ValidationError::new("desugaring.library", codes::INVALID_COORDINATE, err.message)
                .expected("group:artifact:version")
                .actual(desugaring.library.clone().unwrap_or_default()),
        );
    }

    validator.validate()
}

fn check_manifest_placeholders(descriptor: &BuildDescriptor) -> ValidationResult {
    let mut validator = Validator::new();
    for name in descriptor.manifest_placeholders.keys() {
        if !PLACEHOLDER_NAME.is_match(name) {
            validator = validator.error(
                ValidationError::new(
                    "manifest_placeholders",
                    codes::INVALID_PLACEHOLDER,
                    format!("'{}' is not a valid placeholder name", name),
                )
                .expected("identifier")
                .actual(name.as_str()),
            );
        }
    }
    validator.validate()
}

fn check_layout(descriptor: &BuildDescriptor) -> ValidationResult {
    let flutter_index = descriptor.plugins.iter().position(|p| p == FLUTTER_PLUGIN);
    let platform_after_flutter = flutter_index.is_some_and(|flutter| {
        descriptor
            .plugins
            .iter()
            .skip(flutter + 1)
            .any(|p| PLATFORM_PLUGINS.contains(&p.as_str()))
    });

    Validator::new()
        .required("source_root", &descriptor.source_root)
        .warn_if(
            "source_root",
            codes::ABSOLUTE_SOURCE_ROOT,
            Path::new(&descriptor.source_root).is_absolute(),
            "Source root should be relative to the Android project",
        )
        .warn_if(
            "plugins",
            codes::PLUGIN_ORDER,
            platform_after_flutter,
            "The Flutter Gradle plugin must be applied after the Android and Kotlin plugins",
        )
        .validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{StaticSdkProvider, StaticVersionProvider};
    use crate::signing::SigningProfile;
    use droidcfg_core::config::{ProfileKind, SdkConfig, VersionConfig};
    use proptest::prelude::*;

    fn sdk(min: u32, target: u32, compile: u32) -> StaticSdkProvider {
        StaticSdkProvider::from_config(&SdkConfig {
            compile,
            min,
            target,
            ..SdkConfig::default()
        })
    }

    fn version() -> StaticVersionProvider {
        StaticVersionProvider::from_config(&VersionConfig::default())
    }

    fn run(descriptor: &BuildDescriptor, sdk: &StaticSdkProvider) -> ValidationResult {
        let registry = SigningRegistry::new();
        let policy = PolicyConfig::default();
        DescriptorValidator::new(&registry, &policy).validate(descriptor, sdk, &version())
    }

    fn literal_descriptor(min: u32, target: u32, compile: u32) -> BuildDescriptor {
        let mut d = BuildDescriptor::college_admin();
        d.sdk.min = Resolvable::Literal(min);
        d.sdk.target = Resolvable::Literal(target);
        d.sdk.compile = Resolvable::Literal(compile);
        d
    }

    #[test]
    fn test_college_admin_passes_with_debug_signing_warning() {
        let result = run(&literal_descriptor(21, 34, 34), &sdk(21, 34, 34));
        assert!(result.is_valid(), "{:?}", result.errors());
        assert_eq!(result.warnings().len(), 1);
        assert!(result.has_warning(codes::RELEASE_USES_DEBUG_SIGNING));
    }

    #[test]
    fn test_sdk_order_violation() {
        let result = run(&literal_descriptor(35, 34, 34), &sdk(21, 34, 34));
        assert!(!result.is_valid());
        assert!(result.has_error(codes::SDK_ORDER));
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn test_sdk_order_checked_after_token_resolution() {
        let result = run(&BuildDescriptor::college_admin(), &sdk(35, 34, 34));
        assert!(result.has_error(codes::SDK_ORDER));
    }

    #[test]
    fn test_target_above_compile() {
        let result = run(&literal_descriptor(21, 35, 34), &sdk(21, 34, 34));
        let err = &result.errors()[0];
        assert_eq!(err.code, codes::SDK_ORDER);
        assert!(err.message.contains("target (35)"));
    }

    #[test]
    fn test_unresolved_tokens_reported_per_field() {
        let mut d = BuildDescriptor::college_admin();
        d.sdk.min = Resolvable::token("gradle.minSdk");
        d.version.code = Resolvable::token("ci.buildNumber");

        let result = run(&d, &sdk(21, 34, 34));
        let fields: Vec<&str> = result
            .errors()
            .iter()
            .filter(|e| e.code == codes::UNRESOLVED_REFERENCE)
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, ["sdk.min", "version.code"]);
        assert!(!result.has_error(codes::SDK_ORDER));
    }

    #[test]
    fn test_tokens_must_be_dotted_identifiers() {
        let mut d = BuildDescriptor::college_admin();
        d.sdk.min = Resolvable::token("ci-min-sdk");
        d.version.name = Resolvable::token("34");

        let result = run(&d, &sdk(21, 34, 34));
        let fields: Vec<&str> = result
            .errors()
            .iter()
            .filter(|e| e.code == codes::INVALID_TOKEN)
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, ["sdk.min", "version.name"]);

        let clean = run(&BuildDescriptor::college_admin(), &sdk(21, 34, 34));
        assert!(!clean.has_error(codes::INVALID_TOKEN));
    }

    #[test]
    fn test_invalid_application_id() {
        let mut d = literal_descriptor(21, 34, 34);
        d.application_id = "college_admin".to_string();
        d.namespace = Some("com.eschool.1admin".to_string());

        let result = run(&d, &sdk(21, 34, 34));
        assert!(result.has_error(codes::INVALID_APPLICATION_ID));
        assert!(result.has_error(codes::INVALID_NAMESPACE));
    }

    #[test]
    fn test_empty_application_id_is_required_error() {
        let mut d = literal_descriptor(21, 34, 34);
        d.application_id = String::new();

        let result = run(&d, &sdk(21, 34, 34));
        assert!(result.has_error("REQUIRED"));
        assert!(!result.has_error(codes::INVALID_APPLICATION_ID));
    }

    #[test]
    fn test_unknown_signing_profile() {
        let mut d = literal_descriptor(21, 34, 34);
        d.signing.insert("release".to_string(), "upload".to_string());

        let result = run(&d, &sdk(21, 34, 34));
        assert!(result.has_error(codes::UNKNOWN_SIGNING_PROFILE));
        assert!(!result.has_warning(codes::RELEASE_USES_DEBUG_SIGNING));
    }

    #[test]
    fn test_registered_release_profile_is_clean() {
        let mut d = literal_descriptor(21, 34, 34);
        d.signing.insert("release".to_string(), "upload".to_string());

        let mut registry = SigningRegistry::new();
        registry.register(SigningProfile {
            name: "upload".to_string(),
            kind: ProfileKind::Release,
            store_file: Some("upload.jks".to_string()),
            key_alias: Some("upload".to_string()),
        });
        let policy = PolicyConfig::default();
        let result = DescriptorValidator::new(&registry, &policy).validate(
            &d,
            &sdk(21, 34, 34),
            &version(),
        );
        assert!(result.is_clean(), "{:?}", result);
    }

    #[test]
    fn test_debug_signing_policy_levels() {
        let d = literal_descriptor(21, 34, 34);
        let registry = SigningRegistry::new();

        let deny = PolicyConfig {
            release_debug_signing: PolicyLevel::Deny,
        };
        let result =
            DescriptorValidator::new(&registry, &deny).validate(&d, &sdk(21, 34, 34), &version());
        assert!(result.has_error(codes::RELEASE_USES_DEBUG_SIGNING));

        let allow = PolicyConfig {
            release_debug_signing: PolicyLevel::Allow,
        };
        let result =
            DescriptorValidator::new(&registry, &allow).validate(&d, &sdk(21, 34, 34), &version());
        assert!(result.is_clean());
    }

    #[test]
    fn test_validation_does_not_modify_signing() {
        let d = literal_descriptor(21, 34, 34);
        let before = d.clone();
        run(&d, &sdk(21, 34, 34));
        assert_eq!(d, before);
        assert_eq!(d.signing_profile_for("release"), Some("debug"));
    }

    #[test]
    fn test_desugaring_checks() {
        let mut d = literal_descriptor(21, 34, 34);
        d.desugaring.library = None;
        assert!(run(&d, &sdk(21, 34, 34)).has_error(codes::DESUGARING_LIBRARY_MISSING));

        d.desugaring.library = Some("desugar_jdk_libs".to_string());
        assert!(run(&d, &sdk(21, 34, 34)).has_error(codes::INVALID_COORDINATE));

        d.desugaring.enabled = false;
        d.desugaring.library = Some("com.android.tools:desugar_jdk_libs:2.1.4".to_string());
        assert!(run(&d, &sdk(21, 34, 34)).has_warning(codes::DESUGARING_LIBRARY_UNUSED));
    }

    #[test]
    fn test_jvm_target_mismatch_warns() {
        let mut d = literal_descriptor(21, 34, 34);
        d.language.jvm_target = "11".to_string();
        let result = run(&d, &sdk(21, 34, 34));
        assert!(result.is_valid());
        assert!(result.has_warning(codes::JVM_TARGET_MISMATCH));
    }

    #[test]
    fn test_version_code_zero() {
        let mut d = literal_descriptor(21, 34, 34);
        d.version.code = Resolvable::Literal(0);
        assert!(run(&d, &sdk(21, 34, 34)).has_error(codes::INVALID_VERSION_CODE));
    }

    #[test]
    fn test_invalid_placeholder_name() {
        let mut d = literal_descriptor(21, 34, 34);
        d.manifest_placeholders
            .insert("app-name".to_string(), "x".to_string());
        assert!(run(&d, &sdk(21, 34, 34)).has_error(codes::INVALID_PLACEHOLDER));
    }

    #[test]
    fn test_plugin_order_and_absolute_root() {
        let mut d = literal_descriptor(21, 34, 34);
        d.plugins = vec![
            "dev.flutter.flutter-gradle-plugin".to_string(),
            "com.android.application".to_string(),
        ];
        d.source_root = "/srv/app".to_string();

        let result = run(&d, &sdk(21, 34, 34));
        assert!(result.has_warning(codes::PLUGIN_ORDER));
        assert!(result.has_warning(codes::ABSOLUTE_SOURCE_ROOT));
    }

    proptest! {
        #[test]
        fn prop_sdk_order_holds_for_accepted_descriptors(
            min in 1u32..40,
            target in 1u32..40,
            compile in 1u32..40,
        ) {
            let result = run(&literal_descriptor(min, target, compile), &sdk(21, 34, 34));
            prop_assert_eq!(
                result.has_error(codes::SDK_ORDER),
                !(min <= target && target <= compile)
            );
            if result.is_valid() {
                prop_assert!(min <= target && target <= compile);
            }
        }
    }
}
