//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ContentHasher, ControlConfig, ValidationResult};
use crate::planner::RequiredAction;
use crate::uncontrolled::PullReport;
use crate::workflow::{PlanEntry, PlanReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan entry row for table display.
#[derive(Tabled)]
struct PlanEntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Definition")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan report for display.
    #[must_use]
    pub fn format_report(&self, report: &PlanReport, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report, detailed),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &PlanReport, detailed: bool) -> String {
        let mut output = String::new();

        if report.is_up_to_date() {
            let _ = writeln!(
                output,
                "{} No changes required - schema is up to date.",
                "✓".green()
            );
            Self::write_uncontrolled(&mut output, report);
            return output;
        }

        let _ = write!(output, "\nSchema Plan\n");
        let _ = write!(
            output,
            "   Definitions hash: {}\n\n",
            ContentHasher::new().short_hash(&report.definitions_hash)
        );

        let rows: Vec<PlanEntryRow> = report
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                PlanEntry::Planned(plan) => PlanEntryRow {
                    index: i + 1,
                    action: Self::format_action(plan.required_action()),
                    id: plan.id().to_string(),
                    status: plan.status().to_string(),
                },
                PlanEntry::Failed { id, kind, .. } => PlanEntryRow {
                    index: i + 1,
                    action: "failed".red().bold().to_string(),
                    id: id.to_string(),
                    status: kind.to_string(),
                },
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let summary = &report.summary;
        let _ = write!(
            output,
            "\nPlan: {} to create, {} to apply, {} to reapply, {} unchanged\n",
            summary.create.to_string().green(),
            summary.apply.to_string().green(),
            summary.reapply.to_string().yellow(),
            summary.noop
        );

        let failures: Vec<String> = report
            .entries
            .iter()
            .filter_map(|entry| match entry {
                PlanEntry::Failed { id, error, .. } => Some(format!("{id}: {error}")),
                PlanEntry::Planned(plan) if plan.required_action() == RequiredAction::Error => {
                    Some(format!("{}: {} cannot be resolved automatically", plan.id(), plan.status()))
                }
                PlanEntry::Planned(_) => None,
            })
            .collect();
        if !failures.is_empty() {
            let _ = write!(output, "\n{} Requires attention:\n", "⚠".yellow());
            for failure in &failures {
                let _ = writeln!(output, "   - {failure}");
            }
        }

        if report.cancelled {
            let _ = write!(
                output,
                "\n{} Planning was cancelled, {} definitions were not evaluated.\n",
                "⚠".yellow(),
                report.skipped
            );
        }

        Self::write_uncontrolled(&mut output, report);

        if detailed {
            for plan in report.entries.iter().filter_map(PlanEntry::plan) {
                if let Some(difference) = plan.difference() {
                    let _ = write!(output, "\n{}\n", plan.id().to_string().bold());
                    for line in difference.lines() {
                        let _ = writeln!(output, "   {}", Self::colorize_diff_line(line));
                    }
                }
            }
        }

        output
    }

    /// Lists live objects no definition declares.
    fn write_uncontrolled(output: &mut String, report: &PlanReport) {
        let Some(uncontrolled) = report.uncontrolled.as_deref() else {
            return;
        };
        if uncontrolled.is_empty() {
            return;
        }
        let _ = write!(output, "\n{} Uncontrolled resources:\n", "?".cyan());
        for resource in uncontrolled {
            let _ = writeln!(output, "   - {resource}");
        }
        let _ = writeln!(output, "   Run `pull` to write their definitions.");
    }

    /// Formats the outcome of a pull.
    #[must_use]
    pub fn format_pulled(&self, report: &PullReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                if report.pulled.is_empty() {
                    return format!("{} No uncontrolled resources to pull.\n", "✓".green());
                }

                let mut output = format!(
                    "{} Pulled {} resources into {}\n",
                    "✓".green(),
                    report.pulled.len(),
                    report.directory.display()
                );
                for pulled in &report.pulled {
                    let _ = writeln!(output, "   - {} -> {}", pulled.resource, pulled.path.display());
                }
                if let Some(list_file) = &report.list_file {
                    let _ = write!(
                        output,
                        "\nInclude {} in the control file's definitions to manage them.\n",
                        list_file.display()
                    );
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, config: &ControlConfig, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                    "language": config.language,
                    "dialect": config.dialect.to_string(),
                    "definitions": config.definitions.len(),
                    "definitions_hash": config.definitions_hash(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid!\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = write!(output, "\nConfiguration summary:\n");
                let _ = writeln!(output, "   Language: {} {}", config.language, config.dialect);
                let _ = writeln!(output, "   Strict: {}", config.strict);
                let _ = writeln!(output, "   Definitions: {}", config.definitions.len());
                let _ = writeln!(output, "   Parallelism: {}", config.parallelism);
                output
            }
        }
    }

    /// Formats normalized DDL.
    #[must_use]
    pub fn format_normalized(&self, normalized: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "normalized": normalized })).unwrap_or_default()
            }
            OutputFormat::Text => format!("{normalized}\n"),
        }
    }

    /// Formats an action with color.
    fn format_action(action: RequiredAction) -> String {
        match action {
            RequiredAction::Create => "+create".green().to_string(),
            RequiredAction::Apply => "+apply".green().to_string(),
            RequiredAction::Reapply => "~reapply".yellow().to_string(),
            RequiredAction::Error => "!error".red().to_string(),
            RequiredAction::Noop => "noop".dimmed().to_string(),
        }
    }

    /// Colors one line of a rendered difference.
    fn colorize_diff_line(line: &str) -> String {
        if line.starts_with("- ") {
            line.red().to_string()
        } else if line.starts_with("+ ") {
            line.green().to_string()
        } else {
            line.dimmed().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ChangeStatus, DefinitionPlan, DefinitionStatus, PlanId, ResourceStatus};
    use crate::connection::LiveResource;
    use crate::definition::ResourceType;
    use crate::uncontrolled::PulledResource;
    use crate::workflow::{FailureKind, PlanSummary};
    use chrono::Utc;
    use std::path::PathBuf;

    fn report(entries: Vec<PlanEntry>, summary: PlanSummary) -> PlanReport {
        PlanReport {
            created_at: Utc::now(),
            definitions_hash: String::from("0123456789abcdef0123"),
            entries,
            cancelled: false,
            skipped: 0,
            summary,
            uncontrolled: None,
        }
    }

    #[test]
    fn test_up_to_date_report() {
        colored::control::set_override(false);
        let plan = DefinitionPlan::new(
            PlanId::change("seed"),
            DefinitionStatus::Change(ChangeStatus::UpToDate),
            RequiredAction::Noop,
            None,
        )
        .expect("plan is consistent");
        let summary = PlanSummary {
            noop: 1,
            ..PlanSummary::default()
        };
        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report(vec![PlanEntry::Planned(plan)], summary), false);
        assert!(text.contains("No changes required"));
        assert!(!text.contains("Uncontrolled"));
    }

    #[test]
    fn test_up_to_date_report_lists_uncontrolled() {
        colored::control::set_override(false);
        let mut report = report(Vec::new(), PlanSummary::default());
        report.uncontrolled = Some(vec![LiveResource::new(ResourceType::Table, "scratch")]);

        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report, false);
        assert!(text.contains("No changes required"));
        assert!(text.contains("Uncontrolled resources:"));
        assert!(text.contains("   - table scratch"));
    }

    #[test]
    fn test_pulled_text() {
        colored::control::set_override(false);
        let report = PullReport {
            directory: PathBuf::from("schema/uncontrolled"),
            list_file: Some(PathBuf::from("schema/uncontrolled/definitions.yml")),
            pulled: vec![PulledResource {
                resource: LiveResource::new(ResourceType::View, "recent"),
                path: PathBuf::from("views/recent.sql"),
            }],
        };
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_pulled(&report);
        assert!(text.contains("Pulled 1 resources"));
        assert!(text.contains("view recent -> views/recent.sql"));
        assert!(text.contains("definitions.yml"));

        let empty = PullReport {
            pulled: Vec::new(),
            list_file: None,
            ..report
        };
        assert!(formatter.format_pulled(&empty).contains("No uncontrolled resources"));
    }

    #[test]
    fn test_detailed_report_lists_differences_and_failures() {
        colored::control::set_override(false);
        let plan = DefinitionPlan::new(
            PlanId::resource(crate::definition::ResourceType::Table, "user"),
            DefinitionStatus::Resource(ResourceStatus::OutOfSync),
            RequiredAction::Reapply,
            Some(String::from("- `id` INT\n+ `id` BIGINT")),
        )
        .expect("plan is consistent");
        let failed = PlanEntry::Failed {
            id: PlanId::change("seed"),
            kind: FailureKind::LiveStateLookup,
            error: String::from("connection reset"),
        };
        let summary = PlanSummary {
            reapply: 1,
            failed: 1,
            ..PlanSummary::default()
        };

        let text = OutputFormatter::new(OutputFormat::Text)
            .format_report(&report(vec![PlanEntry::Planned(plan), failed], summary), true);
        assert!(text.contains("resource:table:user"));
        assert!(text.contains("1 to reapply"));
        assert!(text.contains("change:seed: connection reset"));
        assert!(text.contains("+ `id` BIGINT"));
    }

    #[test]
    fn test_json_report() {
        let text = OutputFormatter::new(OutputFormat::Json).format_report(&report(Vec::new(), PlanSummary::default()), false);
        let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(json["cancelled"], false);
        assert!(json["entries"].as_array().is_some_and(Vec::is_empty));
    }
}
