//! Terminal rendering for command results and run progress.

use ce_core::dataset::Table;
use ce_protocol::ArtifactKind;
use ce_protocol::RunEvent;
use ce_protocol::RunSettings;
use ce_protocol::RunSummary;
use colored::Colorize;
use std::path::PathBuf;

/// Render a duration in milliseconds as `1.2s` or `2m 05s`.
fn format_elapsed(elapsed_ms: u64) -> String {
    let seconds = elapsed_ms / 1000;
    if seconds < 60 {
        format!("{:.1}s", elapsed_ms as f64 / 1000.0)
    } else {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    }
}

fn print_header(text: &str) {
    println!();
    println!("{}", format!("▶ {text}").bright_yellow().bold());
    println!("{}", "─".repeat(60).dimmed());
}

pub fn print_written(paths: &[PathBuf]) {
    print_header("Project initialised");
    for path in paths {
        println!("{} {}", "+".bright_green(), path.display());
    }
}

pub fn print_provisioned(settings: &RunSettings, table: &Table) {
    print_header("Run provisioned");
    println!("  {:<14}{}", "run id".dimmed(), settings.run_id.bright_white().bold());
    println!("  {:<14}{}", "dataset".dimmed(), settings.dataset_name);
    println!(
        "  {:<14}{} rows, {} columns",
        "shape".dimmed(),
        table.row_count(),
        table.columns().len()
    );
    println!("  {:<14}{}", "target".dimmed(), settings.target_column);
    println!("  {:<14}{}", "problem".dimmed(), settings.problem_type.label());
    println!("  {:<14}{}", "model".dimmed(), settings.model);
    println!();
    println!(
        "{} cognito-eda run {}",
        "ℹ".bright_blue(),
        settings.run_id
    );
}

pub fn print_run_header(run_id: &str, stage_count: usize) {
    print_header(&format!("Run {run_id} ({stage_count} stages)"));
}

pub fn print_event(event: &RunEvent) {
    match event {
        RunEvent::StageCompleted {
            elapsed_ms, record, ..
        } => {
            let marker = if record.is_error() {
                "!".bright_yellow()
            } else {
                "✓".bright_green()
            };
            println!(
                "{} {:<36} {}",
                marker,
                event.label().bright_white(),
                format_elapsed(*elapsed_ms).dimmed()
            );
        }
        RunEvent::RunCompleted {
            stages_completed,
            total_elapsed_ms,
            ..
        } => {
            println!("{}", "─".repeat(60).dimmed());
            println!(
                "{} {} after {} stages in {}",
                "✓".bright_green(),
                event.label().bright_green().bold(),
                stages_completed,
                format_elapsed(*total_elapsed_ms)
            );
        }
        RunEvent::ConfigNotSaved { run_id } => {
            println!(
                "{} {} no provisioned run named {}",
                "✗".bright_red(),
                event.label().bright_red().bold(),
                run_id
            );
        }
        RunEvent::RunFailed { stage, .. } => {
            let at = stage
                .map(|stage| format!(" at {}", stage.as_str()))
                .unwrap_or_default();
            println!(
                "{} {}{} (see the run's error log)",
                "✗".bright_red(),
                event.label().bright_red().bold(),
                at
            );
        }
    }
}

pub fn print_history(runs: &[RunSummary]) {
    if runs.is_empty() {
        println!("{} no runs yet", "ℹ".bright_blue());
        return;
    }
    print_header("Runs");
    for run in runs {
        let status = if run.success {
            "done".bright_green()
        } else if run.has_errors() {
            "failed".bright_red()
        } else {
            "pending".yellow()
        };
        println!(
            "{:<40} {:<8} {}",
            run.run_id.bright_white(),
            status,
            format!("{} stage logs", run.stage_logs().count()).dimmed()
        );
        for artifact in &run.artifacts {
            if matches!(artifact.kind, ArtifactKind::Report | ArtifactKind::ErrorLog) {
                println!("    {}", artifact.name.dimmed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0.0s");
        assert_eq!(format_elapsed(1340), "1.3s");
        assert_eq!(format_elapsed(125_000), "2m 05s");
    }
}
