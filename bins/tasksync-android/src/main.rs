//! TaskSync Android CLI
//!
//! Loads, validates and builds the Android project of the TaskSync app.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tasksync_android::gradle::{self, Variant};
use tasksync_android::{
    parse_override, BuildDescriptor, DescriptorLoader, LoadError, VersionConstraint,
};
use tasksync_cli::output::{self, format_count, format_duration, print_error, print_issues, Status};
use tasksync_core::config::Config;
use tasksync_core::error::{exit_codes, Error};
use tasksync_core::process::command_exists;
use tasksync_core::validation::ValidationIssue;
use tasksync_telemetry::{level_for_verbosity, TelemetryConfig, Timer};

#[derive(Parser)]
#[command(name = "tasksync-android")]
#[command(about = "Load, validate and build the TaskSync Android project")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "TASKSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Override a build context value (repeatable)
    #[arg(short = 'P', value_name = "KEY=VALUE", value_parser = parse_override, global = true)]
    properties: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the build descriptor and print it
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Descriptor file (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// Check the build descriptor
    Validate {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
        /// Descriptor file (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// List dependencies in declaration order
    Deps {
        /// Descriptor file (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// Print the resolved build context
    Context,

    /// Validate the descriptor, then build with Gradle
    Build {
        /// Build configuration
        #[arg(long, value_enum, default_value_t = Configuration::Debug)]
        configuration: Configuration,
        /// Build bundle (AAB) instead of APK
        #[arg(long)]
        bundle: bool,
        /// Clean before building
        #[arg(long)]
        clean: bool,
    },

    /// Diagnose environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Configuration {
    Debug,
    Release,
}

impl From<Configuration> for Variant {
    fn from(configuration: Configuration) -> Self {
        match configuration {
            Configuration::Debug => Variant::Debug,
            Configuration::Release => Variant::Release,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        output::set_color(false);
    }

    tasksync_telemetry::init_with_config(TelemetryConfig {
        log_level: level_for_verbosity(cli.verbose, cli.quiet).to_string(),
        ansi: !cli.no_color,
        ..TelemetryConfig::default()
    })?;

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            std::process::exit(e.exit_code());
        }
    };

    let app = App {
        config,
        overrides: cli.properties,
        quiet: cli.quiet,
    };

    let exit_code = match cli.command {
        Commands::Show { json, file } => app.run_show(file, json),
        Commands::Validate { strict, file } => app.run_validate(file, strict),
        Commands::Deps { file } => app.run_deps(file),
        Commands::Context => app.run_context(),
        Commands::Build {
            configuration,
            bundle,
            clean,
        } => app.run_build(configuration.into(), bundle, clean),
        Commands::Doctor { json } => app.run_doctor(json),
    };

    std::process::exit(exit_code);
}

struct App {
    config: Config,
    overrides: Vec<(String, String)>,
    quiet: bool,
}

impl App {
    fn loader(&self) -> std::result::Result<DescriptorLoader, i32> {
        let mut loader = DescriptorLoader::from_config(&self.config.schema).map_err(report_load_error)?;
        loader.context_mut().apply_overrides(&self.overrides);
        Ok(loader)
    }

    fn descriptor_path(&self, file: Option<PathBuf>) -> PathBuf {
        file.unwrap_or_else(|| self.config.schema.general.descriptor_path())
    }

    /// Load and validate, printing any failure
    fn load(
        &self,
        file: Option<PathBuf>,
    ) -> std::result::Result<(BuildDescriptor, Vec<ValidationIssue>), i32> {
        let path = self.descriptor_path(file);
        let loader = self.loader()?;

        let timer = Timer::start("load descriptor");
        let loaded = loader.load_file_with_warnings(&path).map_err(report_load_error);
        timer.stop();
        loaded
    }

    fn print_warnings(&self, warnings: &[ValidationIssue]) {
        if !self.quiet {
            print_issues(&[], warnings);
        }
    }

    fn run_show(&self, file: Option<PathBuf>, json: bool) -> i32 {
        let (descriptor, warnings) = match self.load(file) {
            Ok(loaded) => loaded,
            Err(code) => return code,
        };

        if json {
            return print_json(&descriptor);
        }

        print_descriptor(&descriptor);
        self.print_warnings(&warnings);
        exit_codes::SUCCESS
    }

    fn run_validate(&self, file: Option<PathBuf>, strict: bool) -> i32 {
        let path = self.descriptor_path(file.clone());
        let (_, warnings) = match self.load(file) {
            Ok(loaded) => loaded,
            Err(code) => return code,
        };

        if strict && !warnings.is_empty() {
            print_issues(&warnings, &[]);
            Status::error(&format!(
                "{}: {} (strict mode)",
                path.display(),
                format_count(warnings.len(), "warning", "warnings")
            ));
            return exit_codes::VALIDATION_ERROR;
        }

        self.print_warnings(&warnings);
        if !self.quiet {
            Status::success(&format!(
                "{} is valid ({})",
                path.display(),
                format_count(warnings.len(), "warning", "warnings")
            ));
        }
        exit_codes::SUCCESS
    }

    fn run_deps(&self, file: Option<PathBuf>) -> i32 {
        let (descriptor, _) = match self.load(file) {
            Ok(loaded) => loaded,
            Err(code) => return code,
        };

        for dep in descriptor.dependencies() {
            let source = match &dep.version_constraint {
                VersionConstraint::Declared(_) => String::new(),
                other => format!("  ({})", other),
            };
            println!("{:<24} {}{}", dep.configuration, dep.notation(), source);
        }
        if !self.quiet {
            Status::info(&format_count(descriptor.dependencies().len(), "dependency", "dependencies"));
        }
        exit_codes::SUCCESS
    }

    fn run_context(&self) -> i32 {
        let loader = match self.loader() {
            Ok(loader) => loader,
            Err(code) => return code,
        };

        for (key, entry) in loader.context().iter() {
            println!("{} = {}  ({})", key, entry.value, entry.source);
        }
        exit_codes::SUCCESS
    }

    fn run_build(&self, variant: Variant, bundle: bool, clean: bool) -> i32 {
        let (descriptor, warnings) = match self.load(None) {
            Ok(loaded) => loaded,
            Err(code) => return code,
        };
        self.print_warnings(&warnings);

        let android_dir = &self.config.schema.general.android_dir;
        let artifact = if bundle { "bundle" } else { "APK" };
        Status::info(&format!(
            "Building {} {} for {}",
            variant,
            artifact,
            descriptor.application_id()
        ));

        let started = Instant::now();
        match gradle::build(android_dir, variant, bundle, clean, self.quiet) {
            Ok(()) => {
                Status::success(&format!(
                    "{} {} built in {}",
                    variant,
                    artifact,
                    format_duration(started.elapsed())
                ));
                exit_codes::SUCCESS
            }
            Err(e) => {
                print_error(&e);
                e.exit_code()
            }
        }
    }

    fn run_doctor(&self, json: bool) -> i32 {
        let general = &self.config.schema.general;
        let wrapper = gradle::wrapper_path(&general.android_dir);
        let descriptor = general.descriptor_path();

        let checks = vec![
            Check::file("gradle wrapper", &wrapper, true),
            Check::file("build descriptor", &descriptor, true),
            Check::command("java", true),
            Check::command("flutter", false),
            Check::command("adb", false),
        ];

        let failed = checks.iter().any(|c| c.required && !c.found);

        if json {
            print_json(&checks);
        } else {
            Status::header("Environment Check");
            for check in &checks {
                match (check.found, check.required) {
                    (true, _) => Status::success(&format!("{}: {}", check.name, check.detail)),
                    (false, true) => Status::error(&format!("{}: not found", check.name)),
                    (false, false) => Status::warning(&format!("{}: not found", check.name)),
                }
            }
        }

        if failed {
            exit_codes::FAILURE
        } else {
            exit_codes::SUCCESS
        }
    }
}

#[derive(Serialize)]
struct Check {
    name: String,
    found: bool,
    required: bool,
    detail: String,
}

impl Check {
    fn file(name: &str, path: &Path, required: bool) -> Self {
        Self {
            name: name.to_string(),
            found: path.is_file(),
            required,
            detail: path.display().to_string(),
        }
    }

    fn command(name: &str, required: bool) -> Self {
        let found = command_exists(name);
        Self {
            name: name.to_string(),
            found,
            required,
            detail: if found { "installed".to_string() } else { String::new() },
        }
    }
}

fn report_load_error(err: LoadError) -> i32 {
    if let LoadError::Validation(e) = &err {
        print_issues(&e.issues, &e.warnings);
        let file = e
            .file
            .as_ref()
            .map_or_else(|| "descriptor".to_string(), |f| f.display().to_string());
        Status::error(&format!(
            "{}: {}",
            file,
            format_count(e.issues.len(), "error", "errors")
        ));
        return exit_codes::VALIDATION_ERROR;
    }

    let error = Error::from(err);
    print_error(&error);
    error.exit_code()
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            exit_codes::SUCCESS
        }
        Err(e) => {
            let error = Error::from(e);
            print_error(&error);
            error.exit_code()
        }
    }
}

fn print_descriptor(descriptor: &BuildDescriptor) {
    Status::header(descriptor.application_id());

    if let Some(namespace) = descriptor.namespace() {
        Status::field("namespace", namespace);
    }
    Status::field("plugins", descriptor.plugins().join(", "));

    let sdk = descriptor.sdk();
    Status::field(
        "sdk",
        format!("min {} / target {} / compile {}", sdk.min, sdk.target, sdk.compile),
    );
    if let Some(ndk) = descriptor.ndk_version() {
        Status::field("ndk", ndk);
    }

    let version = descriptor.version();
    match (&version.name, version.code) {
        (Some(name), Some(code)) => Status::field("version", format!("{} ({})", name, code)),
        (Some(name), None) => Status::field("version", name),
        (None, Some(code)) => Status::field("version", format!("code {}", code)),
        (None, None) => {}
    }

    let options = descriptor.compile_options();
    Status::field(
        "java",
        format!(
            "source {}, target {}, desugaring {}",
            options.source_compat,
            options.target_compat,
            if options.desugaring { "on" } else { "off" }
        ),
    );
    if let Some(jvm_target) = descriptor.jvm_target() {
        Status::field("jvm target", jvm_target);
    }

    for build_type in descriptor.build_types() {
        let signing = build_type
            .signing_config
            .as_ref()
            .map_or_else(|| "unsigned".to_string(), |s| format!("signed with {}", s));
        Status::field(&format!("build type {}", build_type.name), signing);
    }
    if let Some(source) = descriptor.flutter_source() {
        Status::field("flutter source", source);
    }

    Status::subheader(&format_count(
        descriptor.dependencies().len(),
        "dependency",
        "dependencies",
    ));
    for dep in descriptor.dependencies() {
        println!("  {:<24} {}", dep.configuration, dep.notation());
    }
}
