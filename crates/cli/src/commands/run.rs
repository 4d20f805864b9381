//! Run command - execute one transformation run over landed JSON files

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use medallion_config::MedallionConfig;
use medallion_processor::{FactTable, PipelineBuilder, PipelineOrchestrator, RunReport};
use medallion_types::{DimensionKind, GoldTable, RawBatch, RawRow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::open_backend;

/// Arguments of `medallion run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Input files, processed in the given order
    #[arg(long, short, required = true, num_args = 1.., value_name = "FILE")]
    input: Vec<PathBuf>,

    /// Warehouse directory; the run starts from its last checkpoint
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Write the JSON run report here
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

/// Accepted layouts of an input file
#[derive(Deserialize)]
#[serde(untagged)]
enum InputFile {
    Batches(Vec<RawBatch>),
    Batch(RawBatch),
    Rows(Vec<RawRow>),
}

impl RunArgs {
    pub async fn execute(&self, config: MedallionConfig) -> anyhow::Result<()> {
        let mut batches = Vec::new();
        for path in &self.input {
            batches.extend(load_batches(path).await?);
        }
        info!(files = self.input.len(), batches = batches.len(), "input loaded");

        let backend = open_backend(self.state_dir.as_deref()).await?;
        let mut pipeline = PipelineBuilder::new()
            .with_config(config)
            .with_backend(backend)
            .recover()
            .await?;

        let outcome = pipeline.run(batches).await;

        if let Some(report) = pipeline.last_report() {
            print_summary(report, &pipeline).await;
            if let Some(path) = &self.report {
                write_report(report, path).await?;
            }
        }

        outcome?;
        Ok(())
    }
}

/// Parse one input file into batches
///
/// Bare row arrays take their source file from the file name and their
/// ingestion time from the file's modification time.
async fn load_batches(path: &Path) -> anyhow::Result<Vec<RawBatch>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let parsed: InputFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;

    let batches = match parsed {
        InputFile::Batches(batches) => batches,
        InputFile::Batch(batch) => vec![batch],
        InputFile::Rows(rows) => {
            let source_file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let modified = tokio::fs::metadata(path).await?.modified()?;
            vec![RawBatch {
                source_file,
                ingested_at: DateTime::<Utc>::from(modified),
                entity_type: None,
                rows,
            }]
        }
    };
    debug!(path = %path.display(), batches = batches.len(), "input file parsed");
    Ok(batches)
}

async fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    tokio::fs::write(path, report.to_json()?)
        .await
        .with_context(|| format!("writing report to {}", path.display()))?;
    println!("Report written to {}", path.display().to_string().cyan());
    Ok(())
}

async fn print_summary(report: &RunReport, pipeline: &PipelineOrchestrator) {
    let status = if report.is_success() {
        report.state.to_string().green().bold()
    } else {
        report.state.to_string().red().bold()
    };
    println!();
    println!("{} {} ({})", "Run".bold(), report.run_id, status);
    if report.replay {
        println!("  {}", "input already processed, replayed".yellow());
    }
    if let Some(error) = &report.error {
        println!("  {} {}", "failed:".red(), error);
    }

    let ingested = report.counts.ingested();
    let conformed = report.counts.conformed();
    println!();
    println!("{}", "Stages".bold().underline());
    println!(
        "  {:<14} {} accepted, {} quarantined",
        "ingest",
        ingested.accepted,
        ingested.quarantined
    );
    println!(
        "  {:<14} {} inserted, {} updated, {} unchanged",
        "conform", conformed.inserted, conformed.updated, conformed.unchanged
    );
    println!(
        "  {:<14} {} accepted, {} skipped, {} quarantined",
        "facts",
        report.counts.facts.accepted,
        report.counts.facts.skipped,
        report.counts.facts.quarantined
    );
    println!(
        "  {:<14} {} recomputed, {} removed",
        "aggregation", report.counts.aggregation.recomputed, report.counts.aggregation.removed
    );

    if !report.reason_histogram.is_empty() {
        println!();
        println!("{}", "Quarantine".bold().underline());
        for (reason, count) in &report.reason_histogram {
            println!("  {:<22} {}", reason.to_string().yellow(), count);
        }
    }

    let warehouse = pipeline.warehouse();
    println!();
    println!("{}", "Warehouse".bold().underline());
    for kind in DimensionKind::ALL {
        let rows = warehouse.dimensions().lock(kind).await.len();
        println!("  {:<34} {}", kind.table_name(), rows);
    }
    println!("  {:<34} {}", FactTable::NAME, warehouse.facts().len());
    for table in GoldTable::ALL {
        println!("  {:<34} {}", table.name(), warehouse.gold().len(table));
    }
}
