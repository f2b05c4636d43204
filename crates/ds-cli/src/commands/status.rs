//! Status command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ds_core::SequenceNumber;
use ds_migrate::MigrationRecord;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::print_json;
use crate::context::RuntimeContext;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    store: String,
    last_applied_sequence_number: SequenceNumber,
    updated_at: Option<DateTime<Utc>>,
    latest_registered: Option<SequenceNumber>,
    up_to_date: bool,
    pending: Vec<MigrationRecord>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let runner = ctx.runner()?;
    let status = runner
        .status()
        .await
        .context("Failed to read migration checkpoint")?;

    let output = StatusOutput {
        store: ctx.store.store_type().to_string(),
        last_applied_sequence_number: status.last_applied,
        updated_at: status.updated_at,
        latest_registered: status.latest_registered,
        up_to_date: status.is_up_to_date(),
        pending: status.pending,
    };

    match args.output {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => print_text(&output),
    }
    Ok(())
}

fn print_text(output: &StatusOutput) {
    let updated = output
        .updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let latest = output
        .latest_registered
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("Store:           {}", output.store);
    println!("Last applied:    {}", output.last_applied_sequence_number);
    println!("Updated at:      {updated}");
    println!("Latest migration: {latest}");

    if output.up_to_date {
        println!("\nUp to date");
        return;
    }
    println!("\n{} pending:", output.pending.len());
    for record in &output.pending {
        println!("  {record}");
    }
}
