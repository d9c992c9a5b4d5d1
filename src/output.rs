use crate::models::{BatchSummary, OutputTable};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print the batch summary in the specified format
pub fn print_summary(summary: &BatchSummary, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(summary),
        OutputFormat::Json => print_json(summary),
    }
}

fn print_plain(summary: &BatchSummary) {
    println!("=== Batch summary ({}) ===", summary.mode);
    println!();
    println!("{:<22} {}", "Rows", summary.rows_total);
    println!("{:<22} {}", "Processed", summary.rows_processed);
    println!("{:<22} {}", "Skipped", summary.rows_skipped);
    println!("{:<22} {:.2}s", "Elapsed", summary.elapsed_secs);
    println!("{:<22} {:.3} rows/s", "Throughput", summary.throughput);
    match summary.mean_row_latency_secs {
        Some(latency) => println!("{:<22} {:.3}s", "Mean row latency", latency),
        None => println!("{:<22} n/a", "Mean row latency"),
    }
}

fn print_json(summary: &BatchSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing summary to JSON: {}", e),
    }
}

/// Write the table as CSV, creating the parent directory if needed
pub fn write_table(path: &Path, table: &OutputTable) -> Result<()> {
    ensure_directory_exists(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer
        .write_record(&table.headers)
        .context("Failed to write CSV header")?;
    for (i, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Failed to write CSV row {}", i + 1))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write results to: {}", path.display()))?;

    tracing::info!("Results stored to: {}", path.display());
    Ok(())
}

fn ensure_directory_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
