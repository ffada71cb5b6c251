//! Gradle Kotlin DSL interop
//!
//! Reads the build-descriptor settings out of an app-level
//! `build.gradle.kts` and renders a descriptor back into one. Only the
//! declarative subset a Flutter Android embedding uses is understood:
//! plugin ids, `android { ... }` settings, `dependencies` desugaring and the
//! `flutter { source }` block. Anything else is skipped.

use crate::descriptor::{
    is_valid_token, BuildDescriptor, Desugaring, LanguageCompatibility, Resolvable, SdkBounds,
    VersionInfo,
};
use droidcfg_core::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)(?:\[\s*"((?:[^"\\]|\\.)*)"\s*\])?\s*=\s*(.+?)$"#)
        .unwrap()
});

static PLUGIN_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(id|kotlin)\s*\(\s*"([^"]+)"\s*\)"#).unwrap());

static CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*"([^"]*)"\s*\)$"#).unwrap());

static NAMED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:getByName|create|named|maybeCreate)\s*\(\s*"([^"]+)"\s*\)$"#).unwrap()
});

static SIGNING_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^signingConfigs(?:\.getByName\(\s*"([^"]+)"\s*\)|\[\s*"([^"]+)"\s*\]|\.([A-Za-z_][A-Za-z0-9_]*))$"#,
    )
    .unwrap()
});

static JAVA_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^JavaVersion\.VERSION_(\d+(?:_\d+)?)(?:\.toString\(\))?$").unwrap());

static NUMERIC_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());

/// A structural piece of Kotlin DSL source
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Open(String),
    Close,
    Statement(String),
}

/// Split source into block openings, closings and statements, dropping
/// comments. Braces inside string literals are not structural.
fn tokenize(content: &str) -> Vec<(usize, Piece)> {
    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut line = 1;
    let mut in_string = false;
    let mut chars = content.chars().peekable();

    let flush = |buffer: &mut String, line: usize, pieces: &mut Vec<(usize, Piece)>| {
        let text = buffer.trim();
        if !text.is_empty() {
            pieces.push((line, Piece::Statement(text.to_string())));
        }
        buffer.clear();
    };

    while let Some(c) = chars.next() {
        if in_string {
            buffer.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        buffer.push(escaped);
                    }
                }
                '"' => in_string = false,
                '\n' => line += 1,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                buffer.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for n in chars.by_ref() {
                    if n == '\n' {
                        line += 1;
                    }
                    if previous == '*' && n == '/' {
                        break;
                    }
                    previous = n;
                }
            }
            '{' => {
                let name = buffer.trim().to_string();
                buffer.clear();
                pieces.push((line, Piece::Open(name)));
            }
            '}' => {
                flush(&mut buffer, line, &mut pieces);
                pieces.push((line, Piece::Close));
            }
            ';' => flush(&mut buffer, line, &mut pieces),
            '\n' => {
                flush(&mut buffer, line, &mut pieces);
                line += 1;
            }
            _ => buffer.push(c),
        }
    }
    flush(&mut buffer, line, &mut pieces);

    pieces
}

/// Right-hand side of a Kotlin DSL assignment or call argument
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Str(String),
    Int(u32),
    Bool(bool),
    Ref(String),
}

/// Body of a single string literal; `None` when the text holds anything
/// beyond one literal, such as a concatenation
fn string_literal(text: &str) -> Option<&str> {
    let body = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                // a trailing backslash escapes the closing quote
                chars.next()?;
            }
            '"' => return None,
            _ => {}
        }
    }
    Some(body)
}

fn parse_expr(text: &str, line: usize) -> Result<Expr> {
    let text = text.trim();
    if let Some(body) = string_literal(text) {
        return Ok(Expr::Str(unescape(body)));
    }
    if let Ok(value) = text.parse::<u32>() {
        return Ok(Expr::Int(value));
    }
    match text {
        "true" => return Ok(Expr::Bool(true)),
        "false" => return Ok(Expr::Bool(false)),
        _ => {}
    }
    if is_valid_token(text) {
        return Ok(Expr::Ref(text.to_string()));
    }
    Err(Error::gradle(format!(
        "Unsupported expression on line {}: {}",
        line, text
    )))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' | '\\' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn block_name(raw: &str) -> String {
    NAMED_BLOCK
        .captures(raw)
        .map_or_else(|| raw.to_string(), |caps| caps[1].to_string())
}

fn expect_string(key: &str, expr: Expr, line: usize) -> Result<String> {
    match expr {
        Expr::Str(value) => Ok(value),
        other => Err(Error::gradle(format!(
            "{} on line {} must be a string literal, found {:?}",
            key, line, other
        ))),
    }
}

fn expect_bool(key: &str, expr: Expr, line: usize) -> Result<bool> {
    match expr {
        Expr::Bool(value) => Ok(value),
        other => Err(Error::gradle(format!(
            "{} on line {} must be true or false, found {:?}",
            key, line, other
        ))),
    }
}

fn level(key: &str, expr: Expr, line: usize) -> Result<Resolvable<u32>> {
    match expr {
        Expr::Int(value) => Ok(Resolvable::Literal(value)),
        Expr::Ref(token) => Ok(Resolvable::token(token)),
        other => Err(Error::gradle(format!(
            "{} on line {} must be an integer or a provider reference, found {:?}",
            key, line, other
        ))),
    }
}

fn text(key: &str, expr: Expr, line: usize) -> Result<Resolvable<String>> {
    match expr {
        Expr::Str(value) => Ok(Resolvable::Literal(value)),
        Expr::Ref(token) => Ok(Resolvable::token(token)),
        other => Err(Error::gradle(format!(
            "{} on line {} must be a string or a provider reference, found {:?}",
            key, line, other
        ))),
    }
}

fn language_level(key: &str, expr: Expr, line: usize) -> Result<String> {
    match expr {
        Expr::Str(value) => Ok(value),
        Expr::Int(value) => Ok(value.to_string()),
        Expr::Ref(reference) => JAVA_VERSION
            .captures(&reference)
            .map(|caps| caps[1].replace('_', "."))
            .ok_or_else(|| {
                Error::gradle(format!(
                    "{} on line {} must be a JavaVersion constant, found {}",
                    key, line, reference
                ))
            }),
        Expr::Bool(_) => Err(Error::gradle(format!(
            "{} on line {} must be a language level",
            key, line
        ))),
    }
}

fn java_version_constant(level: &str) -> String {
    if NUMERIC_LEVEL.is_match(level) {
        format!("JavaVersion.VERSION_{}", level.replace('.', "_"))
    } else {
        quote(level)
    }
}

/// Assignments understood by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    Namespace,
    CompileSdk,
    NdkVersion,
    SourceCompatibility,
    TargetCompatibility,
    CoreLibraryDesugaring,
    JvmTarget,
    ApplicationId,
    MinSdk,
    TargetSdk,
    VersionCode,
    VersionName,
    ManifestPlaceholder,
    FlutterSource,
}

impl Setting {
    fn lookup(scope: &[&str], key: &str, indexed: bool) -> Option<Self> {
        let setting = match (scope, key) {
            (["android"], "namespace") => Self::Namespace,
            (["android"], "compileSdk") => Self::CompileSdk,
            (["android"], "ndkVersion") => Self::NdkVersion,
            (["android", "compileOptions"], "sourceCompatibility") => Self::SourceCompatibility,
            (["android", "compileOptions"], "targetCompatibility") => Self::TargetCompatibility,
            (["android", "compileOptions"], "isCoreLibraryDesugaringEnabled") => {
                Self::CoreLibraryDesugaring
            }
            (["android", "kotlinOptions"], "jvmTarget") => Self::JvmTarget,
            (["android", "defaultConfig"], "applicationId") => Self::ApplicationId,
            (["android", "defaultConfig"], "minSdk" | "minSdkVersion") => Self::MinSdk,
            (["android", "defaultConfig"], "targetSdk" | "targetSdkVersion") => Self::TargetSdk,
            (["android", "defaultConfig"], "versionCode") => Self::VersionCode,
            (["android", "defaultConfig"], "versionName") => Self::VersionName,
            (["android", "defaultConfig"], "manifestPlaceholders") => Self::ManifestPlaceholder,
            (["flutter"], "source") => Self::FlutterSource,
            _ => return None,
        };
        // only manifestPlaceholders is assigned through an index
        (indexed == (setting == Self::ManifestPlaceholder)).then_some(setting)
    }
}

/// Settings collected while walking the DSL
#[derive(Default)]
struct DescriptorBuilder {
    application_id: Option<String>,
    namespace: Option<String>,
    source_root: Option<String>,
    plugins: Vec<String>,
    compile_sdk: Option<Resolvable<u32>>,
    min_sdk: Option<Resolvable<u32>>,
    target_sdk: Option<Resolvable<u32>>,
    ndk: Option<Resolvable<String>>,
    version_code: Option<Resolvable<u32>>,
    version_name: Option<Resolvable<String>>,
    language: LanguageCompatibility,
    desugaring: Desugaring,
    signing: BTreeMap<String, String>,
    manifest_placeholders: BTreeMap<String, String>,
}

impl DescriptorBuilder {
    fn apply(&mut self, path: &[String], statement: &str, line: usize) -> Result<()> {
        let scope: Vec<&str> = path.iter().map(String::as_str).collect();

        match scope.as_slice() {
            ["plugins"] => {
                self.apply_plugin(statement, line);
                Ok(())
            }
            ["dependencies"] => {
                self.apply_dependency(statement);
                Ok(())
            }
            ["android", "buildTypes", build_type] => {
                self.apply_build_type(build_type, statement, line)
            }
            _ => {
                let setting = ASSIGNMENT.captures(statement).and_then(|caps| {
                    Setting::lookup(&scope, &caps[1], caps.get(2).is_some()).map(|s| (s, caps))
                });
                match setting {
                    Some((setting, caps)) => {
                        let index = caps.get(2).map(|m| unescape(m.as_str()));
                        let expr = parse_expr(&caps[3], line)?;
                        self.apply_setting(setting, &caps[1], index, expr, line)
                    }
                    None => {
                        tracing::debug!(line, scope = %scope.join("."), statement, "Skipping statement");
                        Ok(())
                    }
                }
            }
        }
    }

    fn apply_plugin(&mut self, statement: &str, line: usize) {
        match PLUGIN_ID.captures(statement) {
            Some(caps) if &caps[1] == "kotlin" => {
                self.plugins.push(format!("org.jetbrains.kotlin.{}", &caps[2]));
            }
            Some(caps) => self.plugins.push(caps[2].to_string()),
            None => tracing::debug!(line, statement, "Skipping plugin declaration"),
        }
    }

    fn apply_dependency(&mut self, statement: &str) {
        if let Some(caps) = CALL.captures(statement) {
            if &caps[1] == "coreLibraryDesugaring" {
                self.desugaring.library = Some(caps[2].to_string());
            }
        }
    }

    fn apply_build_type(&mut self, build_type: &str, statement: &str, line: usize) -> Result<()> {
        let Some(caps) = ASSIGNMENT.captures(statement) else {
            return Ok(());
        };
        if &caps[1] != "signingConfig" {
            tracing::debug!(line, build_type, statement, "Skipping build type setting");
            return Ok(());
        }

        let value = caps[3].trim();
        let profile = SIGNING_REF
            .captures(value)
            .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
            .ok_or_else(|| {
                Error::gradle(format!(
                    "Unsupported signingConfig on line {}: {}",
                    line, value
                ))
                .with_suggestion("Reference a profile with signingConfigs.getByName(\"name\")")
            })?;

        self.signing
            .insert(build_type.to_string(), profile.as_str().to_string());
        Ok(())
    }

    fn apply_setting(
        &mut self,
        setting: Setting,
        key: &str,
        index: Option<String>,
        expr: Expr,
        line: usize,
    ) -> Result<()> {
        match setting {
            Setting::Namespace => self.namespace = Some(expect_string(key, expr, line)?),
            Setting::CompileSdk => self.compile_sdk = Some(level(key, expr, line)?),
            Setting::NdkVersion => self.ndk = Some(text(key, expr, line)?),
            Setting::SourceCompatibility => {
                self.language.source = language_level(key, expr, line)?;
            }
            Setting::TargetCompatibility => {
                self.language.target = language_level(key, expr, line)?;
            }
            Setting::CoreLibraryDesugaring => {
                self.desugaring.enabled = expect_bool(key, expr, line)?;
            }
            Setting::JvmTarget => self.language.jvm_target = language_level(key, expr, line)?,
            Setting::ApplicationId => self.application_id = Some(expect_string(key, expr, line)?),
            Setting::MinSdk => self.min_sdk = Some(level(key, expr, line)?),
            Setting::TargetSdk => self.target_sdk = Some(level(key, expr, line)?),
            Setting::VersionCode => self.version_code = Some(level(key, expr, line)?),
            Setting::VersionName => self.version_name = Some(text(key, expr, line)?),
            Setting::ManifestPlaceholder => {
                let value = expect_string(key, expr, line)?;
                self.manifest_placeholders
                    .insert(index.unwrap_or_default(), value);
            }
            Setting::FlutterSource => self.source_root = Some(expect_string(key, expr, line)?),
        }
        Ok(())
    }

    fn finish(self) -> Result<BuildDescriptor> {
        let mut missing = Vec::new();
        if self.application_id.is_none() {
            missing.push("applicationId");
        }
        if self.compile_sdk.is_none() {
            missing.push("compileSdk");
        }
        if self.min_sdk.is_none() {
            missing.push("minSdk");
        }
        if self.target_sdk.is_none() {
            missing.push("targetSdk");
        }
        if self.version_code.is_none() {
            missing.push("versionCode");
        }
        if self.version_name.is_none() {
            missing.push("versionName");
        }

        match (
            self.application_id,
            self.compile_sdk,
            self.min_sdk,
            self.target_sdk,
            self.version_code,
            self.version_name,
        ) {
            (Some(application_id), Some(compile), Some(min), Some(target), Some(code), Some(name)) => {
                Ok(BuildDescriptor {
                    application_id,
                    namespace: self.namespace,
                    source_root: self.source_root.unwrap_or_else(|| "../..".to_string()),
                    plugins: self.plugins,
                    sdk: SdkBounds {
                        compile,
                        min,
                        target,
                        ndk: self.ndk,
                    },
                    version: VersionInfo { code, name },
                    language: self.language,
                    desugaring: self.desugaring,
                    signing: self.signing,
                    manifest_placeholders: self.manifest_placeholders,
                })
            }
            _ => Err(Error::gradle(format!(
                "Missing required settings: {}",
                missing.join(", ")
            ))
            .with_suggestion("Declare them in the android { defaultConfig { ... } } block")),
        }
    }
}

/// Parse an app-level `build.gradle.kts` into a descriptor
pub fn parse_kts(content: &str) -> Result<BuildDescriptor> {
    let mut builder = DescriptorBuilder::default();
    let mut path: Vec<String> = Vec::new();

    for (line, piece) in tokenize(content) {
        match piece {
            Piece::Open(name) => path.push(block_name(&name)),
            Piece::Close => {
                if path.pop().is_none() {
                    return Err(Error::gradle(format!("Unbalanced '}}' on line {}", line)));
                }
            }
            Piece::Statement(statement) => builder.apply(&path, &statement, line)?,
        }
    }

    if !path.is_empty() {
        return Err(Error::gradle(format!("Unclosed block: {}", path.join(" > "))));
    }

    builder.finish()
}

fn render_resolvable<T: ToString>(
    key: &str,
    value: &Resolvable<T>,
    as_string: bool,
) -> Result<String> {
    match value {
        Resolvable::Literal(v) if as_string => Ok(quote(&v.to_string())),
        Resolvable::Literal(v) => Ok(v.to_string()),
        Resolvable::Token { from } if is_valid_token(from) => Ok(from.clone()),
        Resolvable::Token { from } => Err(Error::gradle(format!(
            "{} token '{}' cannot be written as a Kotlin DSL reference",
            key, from
        ))
        .with_suggestion("Use a dotted identifier such as flutter.minSdkVersion")),
    }
}

/// Render a descriptor as an app-level `build.gradle.kts`.
///
/// Fails when a provider token is not a dotted identifier, since the build
/// file could not be read back.
pub fn render_kts(descriptor: &BuildDescriptor) -> Result<String> {
    let compile_sdk = render_resolvable("compileSdk", &descriptor.sdk.compile, false)?;
    let ndk_version = descriptor
        .sdk
        .ndk
        .as_ref()
        .map(|ndk| render_resolvable("ndkVersion", ndk, true))
        .transpose()?;
    let min_sdk = render_resolvable("minSdk", &descriptor.sdk.min, false)?;
    let target_sdk = render_resolvable("targetSdk", &descriptor.sdk.target, false)?;
    let version_code = render_resolvable("versionCode", &descriptor.version.code, false)?;
    let version_name = render_resolvable("versionName", &descriptor.version.name, true)?;

    let mut out = String::new();

    if !descriptor.plugins.is_empty() {
        out.push_str("plugins {\n");
        for plugin in &descriptor.plugins {
            let _ = writeln!(out, "    id({})", quote(plugin));
        }
        out.push_str("}\n\n");
    }

    out.push_str("android {\n");
    if let Some(namespace) = &descriptor.namespace {
        let _ = writeln!(out, "    namespace = {}", quote(namespace));
    }
    let _ = writeln!(out, "    compileSdk = {}", compile_sdk);
    if let Some(ndk) = ndk_version {
        let _ = writeln!(out, "    ndkVersion = {}", ndk);
    }

    let language = &descriptor.language;
    out.push_str("\n    compileOptions {\n");
    let _ = writeln!(
        out,
        "        sourceCompatibility = {}",
        java_version_constant(&language.source)
    );
    let _ = writeln!(
        out,
        "        targetCompatibility = {}",
        java_version_constant(&language.target)
    );
    if descriptor.desugaring.enabled {
        out.push_str("        isCoreLibraryDesugaringEnabled = true\n");
    }
    out.push_str("    }\n\n");

    out.push_str("    kotlinOptions {\n");
    let _ = writeln!(out, "        jvmTarget = {}", quote(&language.jvm_target));
    out.push_str("    }\n\n");

    out.push_str("    defaultConfig {\n");
    let _ = writeln!(out, "        applicationId = {}", quote(&descriptor.application_id));
    let _ = writeln!(out, "        minSdk = {}", min_sdk);
    let _ = writeln!(out, "        targetSdk = {}", target_sdk);
    let _ = writeln!(out, "        versionCode = {}", version_code);
    let _ = writeln!(out, "        versionName = {}", version_name);
    if !descriptor.manifest_placeholders.is_empty() {
        out.push('\n');
        for (name, value) in &descriptor.manifest_placeholders {
            let _ = writeln!(
                out,
                "        manifestPlaceholders[{}] = {}",
                quote(name),
                quote(value)
            );
        }
    }
    out.push_str("    }\n");

    if !descriptor.signing.is_empty() {
        out.push_str("\n    buildTypes {\n");
        for (build_type, profile) in &descriptor.signing {
            let _ = writeln!(out, "        getByName({}) {{", quote(build_type));
            let _ = writeln!(
                out,
                "            signingConfig = signingConfigs.getByName({})",
                quote(profile)
            );
            out.push_str("        }\n");
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");

    if let Some(library) = &descriptor.desugaring.library {
        out.push_str("\ndependencies {\n");
        let _ = writeln!(out, "    coreLibraryDesugaring({})", quote(library));
        out.push_str("}\n");
    }

    out.push_str("\nflutter {\n");
    let _ = writeln!(out, "    source = {}", quote(&descriptor.source_root));
    out.push_str("}\n");

    Ok(out)
}
