//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use citegraph_graph::VerificationReport;
use citegraph_pipeline::{PipelineError, RunReport, StageReport, StageState};

fn state_colored(state: StageState) -> ColoredString {
    match state {
        StageState::Pending => "pending".dimmed(),
        StageState::Running => "running".yellow(),
        StageState::Completed => "completed".green(),
        StageState::Failed => "failed".red().bold(),
    }
}

fn format_elapsed(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Print a run report: scope, partition, stage table and verification.
pub fn print_run_report(report: &RunReport) {
    println!(
        "{} {}",
        "Run".cyan().bold(),
        report.run_id.to_string().dimmed()
    );
    println!(
        "{}: subfield {} / year {}",
        "Scope".bold(),
        report.scope.subfield_id,
        report.scope.publication_year
    );
    println!("{}: {} works", "Working set".bold(), report.working_set);

    let p = &report.partition;
    println!(
        "{}: {} edges -> internal {}, outgoing {} (of {} candidates), incoming {}, discarded {}",
        "Partition".bold(),
        p.edges,
        p.internal,
        p.outgoing,
        p.candidates_out,
        p.incoming,
        p.discarded
    );
    println!();

    print_stages_table(&report.stages);

    let dangling = report.total_dangling();
    if dangling > 0 {
        println!();
        println!(
            "{} {} relationship rows skipped because an endpoint was missing",
            "Warning:".yellow().bold(),
            dangling
        );
    }

    if let Some(verification) = &report.verification {
        println!();
        print_verification(verification);
    }
}

fn print_stages_table(stages: &[StageReport]) {
    if stages.is_empty() {
        println!("{}", "No stages ran.".dimmed());
        return;
    }

    println!(
        "{:<18} {:<10} {:>9} {:>9} {:>8} {:>9} {:>8} {:>7} {:>8}",
        "Stage", "State", "Rows", "Instr", "Batches", "Applied", "Dangling", "Retries", "Time"
    );
    println!("{}", "─".repeat(94));

    for s in stages {
        let dangling = if s.dangling > 0 {
            s.dangling.to_string().yellow()
        } else {
            "0".normal()
        };
        println!(
            "{:<18} {:<10} {:>9} {:>9} {:>8} {:>9} {:>8} {:>7} {:>8}",
            s.stage.as_str(),
            state_colored(s.state),
            s.rows_read,
            s.instructions,
            s.batches_committed,
            s.applied,
            dangling,
            s.retries,
            format_elapsed(s.elapsed_ms)
        );
        if let Some(err) = &s.error {
            println!("  {} {}", "↳".red(), err);
        }
    }
}

/// Print graph counts and connectivity ratios.
pub fn print_verification(report: &VerificationReport) {
    println!("{}", "Verification".cyan().bold());
    print!("{}", report);
    println!(
        "{}: {} nodes, {} relationships",
        "Total".bold(),
        report.total_nodes(),
        report.total_edges()
    );
}

/// Print a one-line summary of why the run stopped.
pub fn print_failure(err: &PipelineError) {
    println!();
    match err {
        PipelineError::StageFailed {
            stage,
            committed_batches,
            rows,
            ..
        } => {
            println!("{} stage {}", "Failed:".red().bold(), stage.as_str().bold());
            println!("  committed batches: {}", committed_batches);
            if let Some(rows) = rows {
                println!("  rejected rows: {}..{}", rows.start, rows.end);
            }
            println!(
                "  {}",
                format!("re-run with --from {} once the cause is fixed", stage.as_str()).dimmed()
            );
        }
        PipelineError::Cancelled {
            stage,
            committed_batches,
            ..
        } => {
            println!(
                "{} stage {} after {} committed batches",
                "Cancelled:".yellow().bold(),
                stage.as_str().bold(),
                committed_batches
            );
        }
        other => {
            println!("{} {}", "Error:".red().bold(), other);
        }
    }
}
