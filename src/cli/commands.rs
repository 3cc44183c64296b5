//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::definition::ResourceType;
use crate::dialect::DatabaseLanguage;

/// schemactl - Declarative schema control for `MySQL` and Postgres.
#[derive(Parser, Debug)]
#[command(name = "schemactl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the control file.
    #[arg(short, long, global = true, env = "SCHEMACTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "SCHEMACTL_LOG_JSON")]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare declared definitions with the live state and print the plan.
    Plan {
        /// Show the difference of every mismatched definition.
        #[arg(short, long)]
        detailed: bool,

        /// Cancel planning after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Validate the control file and the definitions it declares.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Write the normalized DDL of live objects no definition declares.
    Pull {
        /// Output directory (defaults to `uncontrolled/` next to the control file).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the normalized form of a DDL file.
    Normalize {
        /// Database language.
        #[arg(short, long, value_parser = parse_language)]
        language: DatabaseLanguage,

        /// Server version, e.g. 5.7 or 14.
        #[arg(short, long)]
        dialect: String,

        /// Resource type (table, view, procedure, function, trigger, event, materialized_view).
        #[arg(short = 't', long = "type", value_parser = parse_resource_type)]
        resource_type: ResourceType,

        /// DDL file to normalize.
        file: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

fn parse_language(s: &str) -> Result<DatabaseLanguage, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_resource_type(s: &str) -> Result<ResourceType, String> {
    ResourceType::parse(s).ok_or_else(|| {
        let known: Vec<&str> = ResourceType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown resource type '{s}' (expected one of: {})", known.join(", "))
    })
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from(["schemactl", "--output", "json", "plan", "--detailed", "--timeout-secs", "30"])
            .expect("arguments should parse");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(!cli.log_json);
        match cli.command {
            Commands::Plan { detailed, timeout_secs } => {
                assert!(detailed);
                assert_eq!(timeout_secs, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_normalize() {
        let cli = Cli::try_parse_from([
            "schemactl",
            "normalize",
            "--language",
            "postgres",
            "--dialect",
            "14",
            "--type",
            "materialized view",
            "view.sql",
        ])
        .expect("arguments should parse");
        match cli.command {
            Commands::Normalize {
                language,
                resource_type,
                file,
                ..
            } => {
                assert_eq!(language, DatabaseLanguage::Postgres);
                assert_eq!(resource_type, ResourceType::MaterializedView);
                assert_eq!(file, PathBuf::from("view.sql"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_pull() {
        let cli = Cli::try_parse_from(["schemactl", "-c", "schema/control.yml", "pull", "--dir", "out"])
            .expect("arguments should parse");
        assert_eq!(cli.config, Some(PathBuf::from("schema/control.yml")));
        match cli.command {
            Commands::Pull { dir } => assert_eq!(dir, Some(PathBuf::from("out"))),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["schemactl", "pull"]).expect("arguments should parse");
        assert!(matches!(cli.command, Commands::Pull { dir: None }));
    }

    #[test]
    fn test_unknown_resource_type() {
        let err = Cli::try_parse_from([
            "schemactl", "normalize", "-l", "mysql", "-d", "8.0", "-t", "sequence", "x.sql",
        ])
        .expect_err("sequence is not a resource type");
        assert!(err.to_string().contains("unknown resource type 'sequence'"));
    }
}
