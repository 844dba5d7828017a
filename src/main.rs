use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use kbbe_enrich::config::Config;
use kbbe_enrich::logging;
use kbbe_enrich::metrics;
use kbbe_enrich::pipeline::MergeOrchestrator;

#[derive(Parser)]
#[command(name = "kbbe_enrich")]
#[command(about = "Enrich the OGD childcare register with scraped provider data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config. Stock layout is used when the file is absent.
    #[arg(long, default_value = "kbbe.toml")]
    config: PathBuf,

    /// Override the working directory for inputs and outputs
    #[arg(long)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate, link, enrich and write every artifact
    Run,
    /// Only aggregate the provider sources
    Aggregate,
    /// Load all inputs and report what a run would see, writing nothing
    Check,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(dir) = cli.work_dir {
        config.work_dir = dir;
    }

    let _guard = logging::init_logging(&config.log_dir);
    if config.outputs.metrics.is_some() {
        metrics::init_metrics();
    }

    let orchestrator = MergeOrchestrator::new(config).context("Invalid configuration")?;

    match cli.command {
        Commands::Run => {
            println!("🚀 Running merge pipeline...");
            match orchestrator.run() {
                Ok(outcome) => {
                    let summary = &outcome.summary;
                    println!("\n📊 Merge Results (run {}):", summary.run_id);
                    println!("   Reference records: {}", summary.reference_rows);
                    println!("   Candidate records: {}", summary.candidate_rows);
                    for (rule, count) in &summary.matched_by_rule {
                        println!("   Matched by {}: {}", rule, count);
                    }
                    println!("   Unmatched: {}", summary.unmatched_references);
                    println!(
                        "   Operator coverage: {} scraped, {} enriched",
                        summary.coverage.scraped_with_operator,
                        summary.coverage.enriched_with_operator
                    );
                    if !summary.skipped_sources.is_empty() {
                        println!(
                            "\n⚠️  Skipped sources: {}",
                            summary.skipped_sources.join(", ")
                        );
                    }
                    if !summary.missing_enrichment_columns.is_empty() {
                        println!(
                            "⚠️  Columns no source provides: {}",
                            summary.missing_enrichment_columns.join(", ")
                        );
                    }
                    println!("\n   Enriched: {}", outcome.artifacts.enriched.display());
                    println!("   Audit: {}", outcome.artifacts.audit.display());
                    println!("   Summary: {}", outcome.artifacts.summary.display());
                    println!("✅ Merge completed successfully");
                }
                Err(e) => {
                    error!("Merge run failed: {}", e);
                    println!("❌ Merge run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Aggregate => {
            println!("📥 Aggregating provider sources...");
            let (candidates, path) = orchestrator.aggregate_only().context("Aggregation failed")?;
            for report in &candidates.reports {
                println!("   {}: {} rows", report.source, report.rows);
            }
            println!("✅ {} candidates written to {}", candidates.len(), path.display());
        }
        Commands::Check => {
            println!("🔍 Checking inputs...");
            let check = orchestrator.check().context("Input check failed")?;
            for input in &check.inputs {
                println!("   {} ({} rows) sha256 {}", input.name, input.rows, input.sha256);
            }
            for skipped in &check.skipped_sources {
                println!("⚠️  Optional source unavailable: {}", skipped);
            }
            if !check.missing_enrichment_columns.is_empty() {
                println!(
                    "⚠️  Columns no source provides: {}",
                    check.missing_enrichment_columns.join(", ")
                );
            }
            info!(reference_rows = check.reference_rows, "Input check passed");
            println!("✅ Inputs look good");
        }
    }
    Ok(())
}
