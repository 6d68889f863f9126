//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use inventory_lib::{ClusterOutcome, ClusterSummary, RunSummary};
use tabled::{settings::Style, Table, Tabled};

/// Output format for the run summary
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the cluster summary table
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Instances")]
    instances: usize,
    #[tabled(rename = "Tasks")]
    tasks: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ClusterSummary> for ClusterRow {
    fn from(summary: &ClusterSummary) -> Self {
        let (status, detail) = match &summary.outcome {
            ClusterOutcome::Written { tasks_path, .. } => (
                "written",
                tasks_path
                    .parent()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default(),
            ),
            ClusterOutcome::Failed { error } => ("failed", error.clone()),
        };

        Self {
            cluster: summary.short_name.clone(),
            instances: summary.instances,
            tasks: summary.tasks,
            skipped: summary.skipped,
            status: color_status(status),
            detail,
        }
    }
}

/// Print the outcome of a run
pub fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(summary)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Fleet Inventory".bold());
            println!("{}", "=".repeat(60));
            println!("Run: {}", summary.run_id.cyan());
            println!();

            if summary.clusters.is_empty() {
                print_warning("No clusters found");
                return Ok(());
            }

            let rows: Vec<ClusterRow> = summary.clusters.iter().map(ClusterRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);

            let written = summary.written();
            if written > 0 {
                print_success(&format!("{} of {} clusters written", written, summary.clusters.len()));
            }
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status {
        "written" => status.green().to_string(),
        "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}
