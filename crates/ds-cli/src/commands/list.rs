//! List command implementation

use anyhow::{Context, Result};
use ds_core::{MigrationName, SequenceNumber};
use serde::Serialize;

use crate::cli::{GlobalArgs, ListArgs, OutputFormat};
use crate::commands::common::print_json;
use crate::context::RuntimeContext;

/// Registered migration for display
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationInfo {
    sequence_number: SequenceNumber,
    name: MigrationName,
    kind: &'static str,
    applied: bool,
}

/// Execute the list command
pub async fn execute(args: &ListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let status = ctx
        .runner()?
        .status()
        .await
        .context("Failed to read migration checkpoint")?;

    let migrations: Vec<MigrationInfo> = ctx
        .config
        .migrations
        .iter()
        .map(|def| MigrationInfo {
            sequence_number: def.sequence,
            name: def.name.clone(),
            kind: def.step.kind(),
            applied: def.sequence <= status.last_applied,
        })
        .collect();

    match args.output {
        OutputFormat::Json => print_json(&migrations)?,
        OutputFormat::Text => print_table(&migrations),
    }
    Ok(())
}

fn print_table(migrations: &[MigrationInfo]) {
    if migrations.is_empty() {
        println!("No migrations registered");
        return;
    }

    let name_width = migrations
        .iter()
        .map(|m| m.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let kind_width = migrations
        .iter()
        .map(|m| m.kind.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:<4}  {:<name_width$}  {:<kind_width$}  STATUS",
        "SEQ", "NAME", "KIND"
    );
    println!(
        "{:-<4}  {:-<name_width$}  {:-<kind_width$}  {:-<7}",
        "", "", "", ""
    );
    for m in migrations {
        let status = if m.applied { "applied" } else { "pending" };
        println!(
            "{:<4}  {:<name_width$}  {:<kind_width$}  {status}",
            m.sequence_number.to_string(),
            m.name.as_str(),
            m.kind
        );
    }
}
