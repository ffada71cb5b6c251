//! droidcfg CLI
//!
//! Validate, inspect and convert Android build descriptors for Flutter apps.

use anyhow::Result;
use clap::{Parser, Subcommand};
use droidcfg_android::providers::{sdk_provider_for, version_provider_for};
use droidcfg_android::{
    BuildDescriptor, DescriptorFormat, DescriptorValidator, SigningRegistry,
};
use droidcfg_cli::output::{self, Status};
use droidcfg_core::config::Config;
use droidcfg_core::error::{exit_codes, Error, ErrorCode};
use droidcfg_core::validation::ValidationResult;
use droidcfg_telemetry::{timed_span, TelemetryConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "droidcfg")]
#[command(about = "Validate, inspect and convert Android build descriptors")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
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

    /// Write log lines to stderr as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a descriptor and report errors and warnings
    Validate {
        /// Descriptor file (defaults to [general].descriptor)
        path: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print a descriptor
    Show {
        /// Descriptor file (defaults to [general].descriptor)
        path: Option<PathBuf>,
        /// Replace provider tokens with concrete values
        #[arg(long)]
        resolved: bool,
        /// Output format: toml, json, kts
        #[arg(long, default_value = "toml")]
        format: DescriptorFormat,
    },

    /// Read a build.gradle.kts into a descriptor
    Import {
        /// Gradle Kotlin DSL build file
        gradle_file: PathBuf,
        /// Write the descriptor here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Render a descriptor as a build.gradle.kts
    Export {
        /// Descriptor file (defaults to [general].descriptor)
        path: Option<PathBuf>,
        /// Write the build file here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Convert a descriptor between formats, chosen by file extension
    Convert {
        /// Input file (.toml, .json or .gradle.kts)
        input: PathBuf,
        /// Output file (.toml, .json or .gradle.kts)
        output: PathBuf,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Write the college_admin descriptor
    Init {
        /// Destination (defaults to [general].descriptor)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List manifest placeholders
    Placeholders {
        /// Descriptor file (defaults to [general].descriptor)
        path: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let mut telemetry =
        TelemetryConfig::from_verbosity(cli.verbose, cli.quiet).with_json(cli.log_json);
    if cli.no_color {
        telemetry = telemetry.without_ansi();
    }
    droidcfg_telemetry::init_with_config(telemetry)?;
    let _session = droidcfg_telemetry::session_span().entered();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => std::process::exit(report_error(&e, false)),
    };

    let quiet = cli.quiet;
    let exit_code = match cli.command {
        Commands::Validate { path, json, strict } => {
            run_validate(&descriptor_path(&config, path), json, strict, quiet, &config)
        }
        Commands::Show { path, resolved, format } => {
            run_show(&descriptor_path(&config, path), resolved, format, &config)
        }
        Commands::Import { gradle_file, output, force } => {
            run_import(&gradle_file, output.as_deref(), force, quiet)
        }
        Commands::Export { path, output, force } => {
            run_export(&descriptor_path(&config, path), output.as_deref(), force, quiet)
        }
        Commands::Convert { input, output, force } => {
            run_convert(&input, &output, force, quiet)
        }
        Commands::Init { path, force } => {
            run_init(&descriptor_path(&config, path), force, quiet)
        }
        Commands::Placeholders { path, json } => {
            run_placeholders(&descriptor_path(&config, path), json)
        }
    };

    std::process::exit(exit_code);
}

/// Explicit path, or the configured descriptor relative to the config file
fn descriptor_path(config: &Config, path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| config.base_dir().join(&config.schema.general.descriptor))
}

/// Print an error and map it to a process exit code
fn report_error(error: &Error, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(&error.to_report()) {
            Ok(report) => println!("{}", report),
            Err(_) => Status::error(&error.to_string()),
        }
    } else {
        Status::error(&error.to_string());
    }

    match error.code.code() / 1000 {
        3 => exit_codes::CONFIG_ERROR,
        _ => exit_codes::FAILURE,
    }
}

fn ensure_writable(path: &Path, force: bool) -> droidcfg_core::Result<()> {
    if path.exists() && !force {
        return Err(Error::already_exists(path));
    }
    Ok(())
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    descriptor: String,
    valid: bool,
    #[serde(flatten)]
    result: &'a ValidationResult,
}

fn run_validate(path: &Path, json: bool, strict: bool, quiet: bool, config: &Config) -> i32 {
    timed_span!("validate", path = %path.display());

    let descriptor = match BuildDescriptor::load(path) {
        Ok(descriptor) => descriptor,
        Err(e) => return report_error(&e, json),
    };
    let versions = match version_provider_for(config) {
        Ok(provider) => provider,
        Err(e) => return report_error(&e, json),
    };
    let sdk = sdk_provider_for(config);
    let registry = SigningRegistry::from_config(&config.schema.signing);

    let result = DescriptorValidator::new(&registry, &config.schema.policy).validate(
        &descriptor,
        &sdk,
        versions.as_ref(),
    );
    let passed = result.is_valid() && !(strict && !result.warnings().is_empty());

    if json {
        let report = ValidationReport {
            descriptor: path.display().to_string(),
            valid: passed,
            result: &result,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(content) => println!("{}", content),
            Err(e) => return report_error(&Error::from(e), false),
        }
    } else if quiet {
        for error in result.errors() {
            Status::error(&output::format_finding(error));
        }
    } else {
        output::print_validation(&path.display().to_string(), &result);
        if strict && result.is_valid() && !result.warnings().is_empty() {
            Status::error("Warnings are treated as errors (--strict)");
        }
    }

    if passed {
        exit_codes::SUCCESS
    } else {
        exit_codes::VALIDATION_ERROR
    }
}

fn run_show(path: &Path, resolved: bool, format: DescriptorFormat, config: &Config) -> i32 {
    let descriptor = match BuildDescriptor::load(path) {
        Ok(descriptor) => descriptor,
        Err(e) => return report_error(&e, false),
    };

    let rendered = if resolved {
        render_resolved(&descriptor, format, config)
    } else {
        descriptor.render(format)
    };

    match rendered {
        Ok(content) => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
            exit_codes::SUCCESS
        }
        Err(e) => report_error(&e, false),
    }
}

fn render_resolved(
    descriptor: &BuildDescriptor,
    format: DescriptorFormat,
    config: &Config,
) -> droidcfg_core::Result<String> {
    let versions = version_provider_for(config)?;
    let resolved = descriptor.resolve(&sdk_provider_for(config), versions.as_ref())?;

    match format {
        DescriptorFormat::Toml => Ok(toml::to_string_pretty(&resolved)?),
        DescriptorFormat::Json => Ok(serde_json::to_string_pretty(&resolved)?),
        DescriptorFormat::Kotlin => Err(Error::new(
            ErrorCode::InvalidInput,
            "Resolved descriptors can only be shown as toml or json",
        )
        .with_suggestion("Drop --resolved to render the build file with its tokens")),
    }
}

fn run_import(gradle_file: &Path, output: Option<&Path>, force: bool, quiet: bool) -> i32 {
    timed_span!("import", path = %gradle_file.display());

    let descriptor = match BuildDescriptor::load(gradle_file) {
        Ok(descriptor) => descriptor,
        Err(e) => return report_error(&e, false),
    };

    match output {
        Some(out) => {
            let written = ensure_writable(out, force).and_then(|()| descriptor.save(out));
            if let Err(e) = written {
                return report_error(&e, false);
            }
            if !quiet {
                Status::success(&format!(
                    "Imported {} into {}",
                    gradle_file.display(),
                    out.display()
                ));
            }
            exit_codes::SUCCESS
        }
        None => match descriptor.to_toml_string() {
            Ok(content) => {
                print!("{}", content);
                exit_codes::SUCCESS
            }
            Err(e) => report_error(&e, false),
        },
    }
}

fn run_export(path: &Path, output: Option<&Path>, force: bool, quiet: bool) -> i32 {
    let descriptor = match BuildDescriptor::load(path) {
        Ok(descriptor) => descriptor,
        Err(e) => return report_error(&e, false),
    };
    let content = match descriptor.render(DescriptorFormat::Kotlin) {
        Ok(content) => content,
        Err(e) => return report_error(&e, false),
    };

    match output {
        Some(out) => {
            let written = ensure_writable(out, force)
                .and_then(|()| std::fs::write(out, &content).map_err(Error::from));
            if let Err(e) = written {
                return report_error(&e, false);
            }
            if !quiet {
                Status::success(&format!("Wrote {}", out.display()));
            }
        }
        None => print!("{}", content),
    }

    exit_codes::SUCCESS
}

fn run_convert(input: &Path, output: &Path, force: bool, quiet: bool) -> i32 {
    timed_span!("convert", input = %input.display(), output = %output.display());

    let converted = ensure_writable(output, force)
        .and_then(|()| BuildDescriptor::load(input))
        .and_then(|descriptor| descriptor.save(output));

    match converted {
        Ok(()) => {
            if !quiet {
                Status::success(&format!("Converted {} to {}", input.display(), output.display()));
            }
            exit_codes::SUCCESS
        }
        Err(e) => report_error(&e, false),
    }
}

fn run_init(path: &Path, force: bool, quiet: bool) -> i32 {
    let descriptor = BuildDescriptor::college_admin();
    let written = ensure_writable(path, force).and_then(|()| descriptor.save(path));
    if let Err(e) = written {
        return report_error(&e, false);
    }

    if !quiet {
        Status::success(&format!("Wrote {}", path.display()));
        Status::info("The release build type signs with the debug profile; register a release profile in .droidcfg.toml before publishing");
    }
    exit_codes::SUCCESS
}

fn run_placeholders(path: &Path, json: bool) -> i32 {
    let descriptor = match BuildDescriptor::load(path) {
        Ok(descriptor) => descriptor,
        Err(e) => return report_error(&e, json),
    };

    if json {
        match serde_json::to_string_pretty(&descriptor.manifest_placeholders) {
            Ok(content) => println!("{}", content),
            Err(e) => return report_error(&Error::from(e), false),
        }
    } else if descriptor.manifest_placeholders.is_empty() {
        Status::info("No manifest placeholders");
    } else {
        for (name, value) in &descriptor.manifest_placeholders {
            println!("{} = {}", name, value);
        }
    }

    exit_codes::SUCCESS
}
