//! End-to-end tests for the tasksync-android binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const TASKSYNC: &str = include_str!("../../../crates/android/testdata/tasksync.gradle.kts");

const CONFIG: &str = r#"
[general]
android_dir = "android"
descriptor = "app/build.gradle.kts"
"#;

/// A project directory holding a config file and `android/app/build.gradle.kts`
fn project(descriptor: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".tasksync-build.toml"), CONFIG).unwrap();
    let app = temp.path().join("android/app");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::write(app.join("build.gradle.kts"), descriptor).unwrap();
    temp
}

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tasksync-android").unwrap();
    cmd.current_dir(dir)
        .env_remove("TASKSYNC_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("deps"));
}

#[test]
fn validate_accepts_tasksync_descriptor() {
    let temp = project(TASKSYNC);
    cmd(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stderr(predicate::str::contains("DEBUG_SIGNED_RELEASE"));
}

#[test]
fn strict_validation_fails_on_warnings() {
    let temp = project(TASKSYNC);
    cmd(temp.path())
        .args(["validate", "--strict"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn show_json_exports_descriptor() {
    let temp = project(TASKSYNC);
    let output = cmd(temp.path())
        .args(["show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["applicationId"], "com.appdev.tasksync");
    assert_eq!(json["sdk"]["min"], 21);
    assert_eq!(json["compileOptions"]["sourceCompat"], "17");
    assert_eq!(json["dependencies"].as_array().unwrap().len(), 5);
}

#[test]
fn property_override_reaches_descriptor() {
    let temp = project(TASKSYNC);
    let output = cmd(temp.path())
        .args(["-P", "flutter.minSdkVersion=26", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["sdk"]["min"], 26);
}

#[test]
fn inconsistent_sdk_levels_exit_with_validation_code() {
    let temp = project(TASKSYNC);
    cmd(temp.path())
        .args(["-P", "flutter.minSdkVersion=35", "-P", "flutter.targetSdkVersion=21", "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("android.defaultConfig.minSdk"))
        .stderr(predicate::str::contains("[ORDER]"));
}

#[test]
fn malformed_descriptor_exits_with_parse_code() {
    let temp = project("android {\n    compileSdk = 35\n");
    cmd(temp.path())
        .arg("validate")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unclosed block `android`"));
}

#[test]
fn missing_descriptor_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".tasksync-build.toml"), CONFIG).unwrap();
    cmd(temp.path())
        .arg("show")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn deps_keep_declaration_order() {
    let temp = project(TASKSYNC);
    let output = cmd(temp.path()).arg("deps").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let bom = stdout.find("firebase-bom").unwrap();
    let auth = stdout.find("firebase-auth").unwrap();
    let desugar = stdout.find("desugar_jdk_libs").unwrap();
    assert!(bom < auth && auth < desugar);
    assert!(stdout.contains("managed by com.google.firebase:firebase-bom"));
}

#[test]
fn context_shows_layer_sources() {
    let temp = project(TASKSYNC);
    std::fs::write(
        temp.path().join("android/local.properties"),
        "flutter.versionCode=42\n",
    )
    .unwrap();

    cmd(temp.path())
        .args(["-P", "flutter.versionName=9.9.9", "context"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flutter.versionCode = 42  (local.properties)"))
        .stdout(predicate::str::contains("flutter.versionName = 9.9.9  (command line)"))
        .stdout(predicate::str::contains("flutter.minSdkVersion = 21  (defaults)"));
}

#[test]
fn explicit_missing_config_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    cmd(temp.path())
        .args(["--config", "nope.toml", "context"])
        .assert()
        .code(3);
}

#[test]
fn build_requires_gradle_wrapper() {
    let temp = project(TASKSYNC);
    cmd(temp.path())
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gradlew"));
}

/// Installs an executable `android/gradlew` that exits with `code`
#[cfg(unix)]
fn install_wrapper(project: &Path, code: i32) {
    use std::os::unix::fs::PermissionsExt;

    let path = project.join("android/gradlew");
    std::fs::write(&path, format!("#!/bin/sh\necho \"gradle $@\"\nexit {}\n", code)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn build_runs_gradle_wrapper_from_android_dir() {
    let temp = project(TASKSYNC);
    install_wrapper(temp.path(), 0);
    cmd(temp.path())
        .args(["build", "--configuration", "release"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gradle assembleRelease"))
        .stdout(predicate::str::contains("release APK built"));
}

#[cfg(unix)]
#[test]
fn quiet_build_shows_gradle_output_only_on_failure() {
    let temp = project(TASKSYNC);
    install_wrapper(temp.path(), 4);
    cmd(temp.path())
        .args(["-q", "build", "--bundle"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("gradle").not())
        .stderr(predicate::str::contains("gradle bundleDebug"))
        .stderr(predicate::str::contains("exit code 4"));
}

#[cfg(unix)]
#[test]
fn build_with_missing_wrapper_interpreter_exits_127() {
    use std::os::unix::fs::PermissionsExt;

    let temp = project(TASKSYNC);
    let path = temp.path().join("android/gradlew");
    std::fs::write(&path, "#!/nonexistent/tasksync-shell\nexit 0\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    cmd(temp.path())
        .arg("build")
        .assert()
        .code(127)
        .stderr(predicate::str::contains("Command not found: ./gradlew"));
}
