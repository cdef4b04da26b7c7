//! Gradle hand-off
//!
//! A validated descriptor is built by running the project's Gradle wrapper.
//! Nothing here inspects the descriptor; callers load it first.

use std::fmt;
use std::path::{Path, PathBuf};
use tasksync_core::error::{Error, Result};
use tasksync_core::process::{run_command_streaming_in_dir, run_command_in_dir, CommandResult};

/// Build variant to assemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Debug,
    Release,
}

impl Variant {
    fn suffix(self) -> &'static str {
        match self {
            Variant::Debug => "Debug",
            Variant::Release => "Release",
        }
    }

    /// `assembleDebug`, `bundleRelease`, ...
    pub fn task(self, bundle: bool) -> String {
        let action = if bundle { "bundle" } else { "assemble" };
        format!("{}{}", action, self.suffix())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Debug => "debug",
            Variant::Release => "release",
        })
    }
}

/// Path of the Gradle wrapper script in an Android directory
pub fn wrapper_path(android_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        android_dir.join("gradlew.bat")
    } else {
        android_dir.join("gradlew")
    }
}

/// Program that runs the wrapper once the working directory is `android_dir`
fn wrapper(android_dir: &Path) -> Result<&'static str> {
    let path = wrapper_path(android_dir);
    if !path.is_file() {
        return Err(Error::file_not_found(&path)
            .with_suggestion("Run `flutter build apk` once to generate the Gradle wrapper"));
    }
    Ok(if cfg!(windows) { "gradlew.bat" } else { "./gradlew" })
}

/// Run Gradle tasks, capturing output
pub fn run_tasks(android_dir: &Path, tasks: &[&str]) -> Result<CommandResult> {
    let result = run_command_in_dir(wrapper(android_dir)?, tasks, android_dir)?;
    if !result.success {
        return Err(Error::gradle(format!(
            "{} failed with exit code {}",
            tasks.join(" "),
            result.exit_code
        ))
        .with_context(result.combined_output()));
    }
    Ok(result)
}

/// Run Gradle tasks with output streamed to the terminal
pub fn run_tasks_streaming(android_dir: &Path, tasks: &[&str]) -> Result<()> {
    tracing::info!(tasks = ?tasks, dir = %android_dir.display(), "running gradle");

    let code = run_command_streaming_in_dir(wrapper(android_dir)?, tasks, android_dir)?;
    if code != 0 {
        return Err(Error::gradle(format!(
            "{} failed with exit code {}",
            tasks.join(" "),
            code
        )));
    }
    Ok(())
}

/// Build an APK, or an app bundle when `bundle` is set
///
/// With `quiet` the Gradle output is captured and only shown when the build
/// fails.
pub fn build(
    android_dir: &Path,
    variant: Variant,
    bundle: bool,
    clean: bool,
    quiet: bool,
) -> Result<()> {
    let task = variant.task(bundle);
    let mut tasks = Vec::with_capacity(2);
    if clean {
        tasks.push("clean");
    }
    tasks.push(task.as_str());

    if quiet {
        run_tasks(android_dir, &tasks).map(|_| ())
    } else {
        run_tasks_streaming(android_dir, &tasks)
    }
}
