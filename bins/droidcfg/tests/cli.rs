//! End-to-end tests for the droidcfg binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DESCRIPTOR: &str = "android/app/descriptor.toml";

const BUILD_FILE: &str = r#"plugins {
    id("com.android.application")
    id("kotlin-android")
    id("dev.flutter.flutter-gradle-plugin")
}

android {
    namespace = "com.eschool.college_admin"
    compileSdk = flutter.compileSdkVersion
    ndkVersion = flutter.ndkVersion

    compileOptions {
        sourceCompatibility = JavaVersion.VERSION_17
        targetCompatibility = JavaVersion.VERSION_17
        isCoreLibraryDesugaringEnabled = true
    }

    kotlinOptions {
        jvmTarget = "17"
    }

    defaultConfig {
        applicationId = "com.eschool.college_admin"
        minSdk = flutter.minSdkVersion
        targetSdk = flutter.targetSdkVersion
        versionCode = flutter.versionCode
        versionName = flutter.versionName
        manifestPlaceholders["applicationName"] = "android.app.Application"
    }

    buildTypes {
        release {
            signingConfig = signingConfigs.getByName("debug")
        }
    }
}

dependencies {
    coreLibraryDesugaring("com.android.tools:desugar_jdk_libs:2.1.4")
}

flutter {
    source = "../.."
}
"#;

const OUT_OF_ORDER: &str = r#"application_id = "com.eschool.college_admin"

[sdk]
compile = 35
min = 30
target = 28

[version]
code = 3
name = "1.2.0"
"#;

fn droidcfg(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("droidcfg").unwrap();
    cmd.current_dir(dir).arg("--no-color");
    cmd
}

fn initialized() -> TempDir {
    let temp = TempDir::new().unwrap();
    droidcfg(temp.path()).arg("init").assert().success();
    temp
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    droidcfg(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn init_writes_descriptor() {
    let temp = initialized();
    let content = fs::read_to_string(temp.path().join(DESCRIPTOR)).unwrap();
    assert!(content.contains("application_id = \"com.eschool.college_admin\""));
    assert!(content.contains("flutter.minSdkVersion"));
}

#[test]
fn init_refuses_to_overwrite() {
    let temp = initialized();
    droidcfg(temp.path())
        .arg("init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    droidcfg(temp.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn validate_reports_debug_signing_as_warning() {
    let temp = initialized();
    droidcfg(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("RELEASE_USES_DEBUG_SIGNING"));
}

#[test]
fn validate_strict_fails_on_warnings() {
    let temp = initialized();
    droidcfg(temp.path())
        .args(["validate", "--strict"])
        .assert()
        .code(2);
}

#[test]
fn validate_deny_policy_fails() {
    let temp = initialized();
    fs::write(
        temp.path().join(".droidcfg.toml"),
        "[policy]\nrelease_debug_signing = \"deny\"\n",
    )
    .unwrap();

    droidcfg(temp.path())
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("RELEASE_USES_DEBUG_SIGNING"));
}

#[test]
fn validate_allow_policy_is_clean() {
    let temp = initialized();
    fs::write(
        temp.path().join(".droidcfg.toml"),
        "[policy]\nrelease_debug_signing = \"allow\"\n",
    )
    .unwrap();

    droidcfg(temp.path())
        .args(["validate", "--strict"])
        .assert()
        .success();
}

#[test]
fn validate_rejects_sdk_out_of_order() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.toml"), OUT_OF_ORDER).unwrap();

    droidcfg(temp.path())
        .args(["validate", "app.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SDK_ORDER"));
}

#[test]
fn validate_json_output() {
    let temp = initialized();
    let output = droidcfg(temp.path())
        .args(["validate", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["errors"].as_array().map(Vec::len), Some(0));
    assert_eq!(report["warnings"][0]["code"], "RELEASE_USES_DEBUG_SIGNING");
}

#[test]
fn validate_missing_descriptor_fails() {
    let temp = TempDir::new().unwrap();
    droidcfg(temp.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn explicit_missing_config_is_a_config_error() {
    let temp = initialized();
    droidcfg(temp.path())
        .args(["--config", "missing.toml", "validate"])
        .assert()
        .code(3);
}

#[test]
fn import_gradle_file_to_stdout() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("build.gradle.kts"), BUILD_FILE).unwrap();

    droidcfg(temp.path())
        .args(["import", "build.gradle.kts"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "application_id = \"com.eschool.college_admin\"",
        ))
        .stdout(predicate::str::contains("desugar_jdk_libs:2.1.4"));
}

#[test]
fn import_then_validate() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("build.gradle.kts"), BUILD_FILE).unwrap();

    droidcfg(temp.path())
        .args(["import", "build.gradle.kts", "-o", DESCRIPTOR])
        .assert()
        .success();
    droidcfg(temp.path()).arg("validate").assert().success();
}

#[test]
fn convert_toml_to_json() {
    let temp = initialized();
    droidcfg(temp.path())
        .args(["convert", DESCRIPTOR, "descriptor.json"])
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("descriptor.json")).unwrap())
            .unwrap();
    assert_eq!(json["application_id"], "com.eschool.college_admin");
    assert_eq!(json["sdk"]["min"]["from"], "flutter.minSdkVersion");
}

#[test]
fn convert_rejects_unknown_extension() {
    let temp = initialized();
    droidcfg(temp.path())
        .args(["convert", DESCRIPTOR, "descriptor.yaml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unsupported descriptor format"));
}

#[test]
fn export_renders_build_file() {
    let temp = initialized();
    droidcfg(temp.path())
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("minSdk = flutter.minSdkVersion"))
        .stdout(predicate::str::contains(
            "signingConfig = signingConfigs.getByName(\"debug\")",
        ));
}

#[test]
fn show_resolved_uses_configured_levels() {
    let temp = initialized();
    fs::write(
        temp.path().join(".droidcfg.toml"),
        "[sdk]\ncompile = 34\nmin = 23\ntarget = 34\n\n[version]\ncode = 7\nname = \"2.1.0\"\n",
    )
    .unwrap();

    let output = droidcfg(temp.path())
        .args(["show", "--resolved", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let resolved: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resolved["sdk"]["min"], 23);
    assert_eq!(resolved["sdk"]["compile"], 34);
    assert_eq!(resolved["version"]["code"], 7);
    assert_eq!(resolved["version"]["name"], "2.1.0");
}

#[test]
fn show_resolved_prefers_pubspec_version() {
    let temp = initialized();
    fs::write(temp.path().join("pubspec.yaml"), "name: college_admin\nversion: 1.4.2+19\n")
        .unwrap();

    droidcfg(temp.path())
        .args(["show", "--resolved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code = 19"))
        .stdout(predicate::str::contains("name = \"1.4.2\""));
}

#[test]
fn placeholders_lists_entries() {
    let temp = initialized();
    droidcfg(temp.path())
        .arg("placeholders")
        .assert()
        .success()
        .stdout(predicate::str::contains("applicationName = android.app.Application"));
}

#[test]
fn no_color_output_has_no_escape_codes() {
    let temp = initialized();
    let output = droidcfg(temp.path())
        .env("FORCE_COLOR", "1")
        .env("CLICOLOR_FORCE", "1")
        .args(["-vv", "validate"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stdout.contains("✓"));
    assert!(stderr.contains("RELEASE_USES_DEBUG_SIGNING"));
    assert!(!stdout.contains("\x1b["), "{:?}", stdout);
    assert!(!stderr.contains("\x1b["), "{:?}", stderr);
}

#[test]
fn config_directory_anchors_paths_at_project_root() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(".config")).unwrap();
    fs::write(
        temp.path().join(".config/droidcfg.toml"),
        "[version]\ncode = 5\n",
    )
    .unwrap();
    fs::write(temp.path().join("pubspec.yaml"), "name: college_admin\nversion: 9.9.9+42\n")
        .unwrap();

    droidcfg(temp.path()).arg("init").assert().success();
    assert!(temp.path().join(DESCRIPTOR).is_file());
    assert!(!temp.path().join(".config/android").exists());

    droidcfg(temp.path())
        .args(["show", "--resolved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code = 42"))
        .stdout(predicate::str::contains("name = \"9.9.9\""));
}

#[test]
fn log_json_tags_lines_with_session() {
    let temp = initialized();
    let output = droidcfg(temp.path())
        .args(["--log-json", "-vvv", "validate"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let line = stderr
        .lines()
        .find(|line| line.contains("Timer completed"))
        .unwrap();
    let event: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(event["fields"]["operation"], "validate");
    assert!(event["spans"][0]["session_id"].is_string());
}
