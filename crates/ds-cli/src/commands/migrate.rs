//! Migrate command implementation

use anyhow::{Context, Result};
use ds_core::FailurePolicy;
use ds_migrate::{Outcome, RunReport, RunStatus};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::ExitCode;
use crate::context::RuntimeContext;

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let mut runner = ctx.runner()?.with_cancel_flag(Arc::clone(&cancel));
    if args.continue_on_failure {
        runner = runner.with_policy(FailurePolicy::Continue);
    }
    if let Some(batch_size) = args.batch_size {
        runner = runner.with_batch_size(batch_size);
    }

    // Ctrl-C only raises the flag; the runner stops between units.
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, stopping after the current migration");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    println!(
        "Migrating {} ({} store, {} registered migration(s))\n",
        ctx.config.name,
        ctx.store.store_type(),
        runner.registry().len()
    );

    let result = runner.run().await;
    interrupt.abort();
    let report = result.context("Failed to read migration checkpoint")?;

    print_report(&report);

    if let Some(path) = &args.report {
        report
            .save(Path::new(path))
            .with_context(|| format!("Failed to write run report to {path}"))?;
        println!("Report written to {path}");
    }

    match exit_code(report.status) {
        0 => Ok(()),
        code => Err(ExitCode(code).into()),
    }
}

/// Process exit code for a finished run
fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Completed => 0,
        RunStatus::Failed | RunStatus::Running => 1,
        RunStatus::Cancelled => 2,
    }
}

fn print_report(report: &RunReport) {
    if report.entries.is_empty() {
        println!("  Nothing to apply, checkpoint is {}", report.final_checkpoint);
    }

    for entry in &report.entries {
        let marker = match entry.outcome {
            Outcome::Applied => "✓",
            Outcome::Failed => "✗",
            Outcome::Skipped => "-",
        };
        match entry.outcome {
            Outcome::Skipped => println!(
                "  {marker} {} {} ({})",
                entry.sequence_number, entry.name, entry.detail
            ),
            _ => println!(
                "  {marker} {} {} - {} [{}ms]",
                entry.sequence_number, entry.name, entry.detail, entry.duration_ms
            ),
        }
    }

    if let Some(error) = &report.error {
        eprintln!("\nRun error: {error}");
    }

    println!();
    println!(
        "Run {} {}: {}",
        report.run_id,
        report.status,
        report.summary()
    );
    println!(
        "Checkpoint: {} -> {}",
        report.initial_checkpoint, report.final_checkpoint
    );
}
