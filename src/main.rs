//! schemactl CLI entrypoint.
//!
//! This is the main entrypoint for the schemactl command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use schema_control::cli::{Cli, Commands, OutputFormatter};
use schema_control::config::{ConfigParser, ConfigValidator, ControlConfig, find_config_file};
use schema_control::definition::ResourceType;
use schema_control::dialect::{DatabaseLanguage, DialectSettings, DialectVersion};
use schema_control::error::Result;
use schema_control::uncontrolled::UncontrolledFinder;
use schema_control::workflow::{CancelHandle, PlanWorkflow};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code of a plan that needs a human decision.
const EXIT_ATTENTION: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Plan { detailed, timeout_secs } => {
            cmd_plan(cli.config.as_ref(), detailed, timeout_secs, &formatter).await
        }
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter).await,
        Commands::Pull { dir } => cmd_pull(cli.config.as_ref(), dir, &formatter).await,
        Commands::Normalize {
            language,
            dialect,
            resource_type,
            file,
        } => cmd_normalize(language, &dialect, resource_type, &file, &formatter),
    }
}

/// Build and print the plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    timeout_secs: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config = load_config(config_path).await?;
    ConfigValidator::new().validate(&config)?;

    let workflow = PlanWorkflow::new(&config)?;
    let (handle, signal) = CancelHandle::new();

    let planning = workflow.plan_all(&signal);
    tokio::pin!(planning);

    let deadline = async {
        match timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    // The first interruption cancels; planning then drains and returns the partial report.
    let report = loop {
        tokio::select! {
            report = &mut planning => break report,
            result = tokio::signal::ctrl_c(), if !signal.is_cancelled() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Interrupted, cancelling planning");
                handle.cancel();
            }
            () = &mut deadline, if !signal.is_cancelled() => {
                info!("Planning timed out, cancelling");
                handle.cancel();
            }
        }
    };

    print_output(&formatter.format_report(&report, detailed))?;

    if report.requires_attention() {
        Ok(ExitCode::from(EXIT_ATTENTION))
    } else if report.cancelled {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Validate configuration.
async fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config = load_config(config_path).await?;
    let result = ConfigValidator::new().check(&config);

    print_output(&formatter.format_validation(&config, &result, show_warnings))?;

    Ok(if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Write the definitions of uncontrolled objects.
async fn cmd_pull(config_path: Option<&PathBuf>, dir: Option<PathBuf>, formatter: &OutputFormatter) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    let config = load_config(Some(&config_file)).await?;
    ConfigValidator::new().validate(&config)?;

    let dir = dir.unwrap_or_else(|| {
        config_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("uncontrolled")
    });
    let report = UncontrolledFinder::from_config(&config)
        .pull(&dir, config.parallelism)
        .await?;

    print_output(&formatter.format_pulled(&report))?;
    Ok(ExitCode::SUCCESS)
}

/// Print the normalized form of a DDL file.
fn cmd_normalize(
    language: DatabaseLanguage,
    dialect: &str,
    resource_type: ResourceType,
    file: &Path,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let dialect: DialectVersion = dialect.parse()?;
    let sql = std::fs::read_to_string(file)?;
    debug!("Normalizing {} as {language} {dialect} {resource_type}", file.display());

    let adapter = language.adapter(dialect, DialectSettings::default());
    let normalized = adapter.normalize(resource_type, &sql)?;

    print_output(&formatter.format_normalized(&normalized))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads the control file, its definitions and the live-state snapshot.
async fn load_config(config_path: Option<&PathBuf>) -> Result<ControlConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;

    parser.load_control(&config_file).await
}

/// Writes command output to stdout.
fn print_output(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
