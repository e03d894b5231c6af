use colored::*;
use trivy_task_core::{ResolvedArtifact, RunReport, Stage, TaskStatus};

/// Print a short human summary after the pipeline commands.
pub fn print_run_summary(report: &RunReport) {
    println!();
    println!(
        "{}",
        format!(" trivy-task v{} — Scan Summary", env!("CARGO_PKG_VERSION")).bold()
    );
    println!();

    if let Some(ref invocation) = report.invocation {
        println!(" {} Command: {}", "|-".dimmed(), invocation.to_string().cyan());
    }

    if let Some(ref outcome) = report.outcome {
        let code = outcome.exit_code.to_string();
        println!(
            " {} Trivy exit code: {}",
            "|-".dimmed(),
            if outcome.is_clean() {
                code.green().to_string()
            } else {
                code.red().bold().to_string()
            }
        );
    }

    if let Some(ref attachment) = report.attachment {
        println!(
            " {} Report: {} ({})",
            "|-".dimmed(),
            attachment.path.display(),
            attachment.name.dimmed()
        );
    }

    if report.stage == Stage::Failed {
        println!(" {} Stopped before the scan finished", "|-".dimmed());
    }
    println!();

    match report.result.status {
        TaskStatus::Succeeded => println!(" {} {}", "OK".green().bold(), report.result.message),
        TaskStatus::Failed => println!(" {} {}", "FAILED".red().bold(), report.result.message),
    }
    println!();
}

/// Print a resolved release archive.
pub fn print_artifact(artifact: &ResolvedArtifact) {
    println!(" {}", "Trivy Release".bold().underline());
    println!(" {} Version:      {}", "|-".dimmed(), artifact.version);
    println!(" {} Architecture: {}", "|-".dimmed(), artifact.arch_tag.cyan());
    println!(" {} URL:          {}", "|-".dimmed(), artifact.download_url);
}
