//! Catalog Indexer CLI - run and resume the vector-indexing pipeline
//!
//! Every stage command takes the run id of the run it works on; paths are
//! re-derived from that id, so a failed run can be resumed stage by stage.

mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use catalog_indexer::{
    maybe_start_scheduler, EmbeddingOutcome, IndexUpdateMode, JobState, PipelineOrchestrator,
    PipelineResult, RunId, StorageUri,
};
use catalog_indexer_adapters::AdapterSettings;

use config::Config;

#[derive(Parser)]
#[command(name = "catalog-indexer")]
#[command(about = "Catalog Indexer - batch embedding and vector index refresh", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four stages for a run
    Run {
        /// Run id (a fresh one is minted if omitted)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Export the catalog to content and metadata files
    Export {
        /// Run id
        run_id: String,
    },

    /// Submit the batch embedding job for a run
    Embed {
        /// Run id
        run_id: String,
        /// Return right after submission instead of waiting for the job
        #[arg(long)]
        no_wait: bool,
    },

    /// Check an embedding job once
    Poll {
        /// Run id
        run_id: String,
        /// Job resource name returned by `embed --no-wait`
        job: String,
    },

    /// Merge metadata with embedding output into datapoints
    Transform {
        /// Run id
        run_id: String,
        /// Shard prefix (defaults to the run's embeddings prefix)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Publish a run's datapoints to the vector index
    Index {
        /// Run id
        run_id: String,
        /// Upsert by id instead of replacing the whole index
        #[arg(long)]
        incremental: bool,
        /// Skip the confirmation prompt for a complete overwrite
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the recorded result of a run
    Status {
        /// Run id
        run_id: String,
        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// Show which pipeline clients are configured
    Health,

    /// Run the pipeline periodically until interrupted
    Schedule {
        /// Seconds between runs (defaults to the configured schedule interval)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_indexer=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { run_id } => cmd_run(run_id).await,
        Commands::Export { run_id } => cmd_export(&run_id).await,
        Commands::Embed { run_id, no_wait } => cmd_embed(&run_id, !no_wait).await,
        Commands::Poll { run_id, job } => cmd_poll(&run_id, &job).await,
        Commands::Transform { run_id, prefix } => cmd_transform(&run_id, prefix).await,
        Commands::Index { run_id, incremental, yes } => cmd_index(&run_id, incremental, yes).await,
        Commands::Status { run_id, json } => cmd_status(&run_id, json).await,
        Commands::Health => cmd_health(),
        Commands::Schedule { interval_secs } => cmd_schedule(interval_secs).await,
        Commands::Config => cmd_config(),
    }
}

/// Environment first, config file for anything the environment leaves unset
fn load_settings() -> Result<AdapterSettings> {
    let config = Config::load()?;
    let settings = AdapterSettings::from_env().context("Invalid environment configuration")?;
    Ok(config.fill(settings))
}

fn orchestrator() -> Result<PipelineOrchestrator> {
    load_settings()?
        .build_orchestrator()
        .context("Could not build the pipeline (is CATALOG_INDEXER_BASE_URI set?)")
}

fn parse_run_id(raw: &str) -> Result<RunId> {
    RunId::parse(raw).with_context(|| format!("Invalid run id '{}'", raw))
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_run(run_id: Option<String>) -> Result<()> {
    let orchestrator = orchestrator()?;
    let run_id = match run_id {
        Some(raw) => parse_run_id(&raw)?,
        None => RunId::generate(),
    };

    println!("Starting run {}", run_id.to_string().cyan());
    let result = orchestrator.run(run_id).await;
    print_result(&result);

    if !result.success {
        bail!("Run {} failed", result.run_id);
    }
    Ok(())
}

async fn cmd_export(run_id: &str) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let outcome = orchestrator()?.export_only(&run_id).await?;

    println!(
        "{} Exported {} items ({} skipped) in {}ms",
        "✓".green(),
        outcome.item_count.to_string().green(),
        outcome.failed_count,
        outcome.duration_ms
    );
    println!("  content:  {}", outcome.content_uri.to_string().dimmed());
    println!("  metadata: {}", outcome.metadata_uri.to_string().dimmed());
    Ok(())
}

async fn cmd_embed(run_id: &str, wait: bool) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let outcome = orchestrator()?.embed_only(&run_id, wait).await?;
    print_job(&outcome);

    if !wait {
        println!("\n{}", "Check on it later with:".dimmed());
        println!("  catalog-indexer poll {} {}", run_id, outcome.job_name);
    }
    Ok(())
}

async fn cmd_poll(run_id: &str, job: &str) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let outcome = orchestrator()?.poll_job(&run_id, job).await?;
    print_job(&outcome);
    Ok(())
}

async fn cmd_transform(run_id: &str, prefix: Option<String>) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let prefix = prefix
        .map(|raw| StorageUri::parse(&raw).map(|uri| uri.as_prefix()))
        .transpose()
        .context("Invalid --prefix")?;

    let outcome = orchestrator()?.transform_only(&run_id, prefix).await?;

    println!(
        "{} Transformed {} datapoints from {} shards ({} skipped) in {}ms",
        "✓".green(),
        outcome.transformed_count.to_string().green(),
        outcome.shard_count,
        outcome.failed_count,
        outcome.duration_ms
    );
    if outcome.has_count_mismatch() {
        println!(
            "  {} {} metadata records vs {} embedding records",
            "count mismatch:".yellow(),
            outcome.metadata_count,
            outcome.embedding_count
        );
    }
    println!("  output: {}", outcome.output_uri.to_string().dimmed());
    Ok(())
}

async fn cmd_index(run_id: &str, incremental: bool, yes: bool) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let mode = IndexUpdateMode::from_overwrite_flag(!incremental);

    if mode.is_complete_overwrite() && !yes {
        let confirmed = Confirm::new()
            .with_prompt("Replace the entire vector index with this run's datapoints?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let resource = orchestrator()?.index_only(&run_id, Some(mode)).await?;
    println!("{} Index updated ({}): {}", "✓".green(), mode, resource.cyan());
    Ok(())
}

async fn cmd_status(run_id: &str, json: bool) -> Result<()> {
    let run_id = parse_run_id(run_id)?;
    let Some(result) = orchestrator()?.run_status(&run_id).await? else {
        println!("No result recorded for run {}", run_id.to_string().cyan());
        return Ok(());
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize run record")?
        );
    } else {
        print_result(&result);
    }
    Ok(())
}

fn cmd_health() -> Result<()> {
    let settings = load_settings()?;
    let clients = settings.build_clients();
    let missing = clients.missing();

    println!("{}", "Pipeline clients:".bold());
    for name in ["catalog reader", "object store", "embedding service", "vector index"] {
        let status = if missing.contains(&name) {
            "Not configured".red()
        } else {
            "OK".green()
        };
        println!("  {}: {}", name, status);
    }

    if !missing.is_empty() {
        bail!("Pipeline unavailable: {} not configured", missing.join(", "));
    }
    Ok(())
}

async fn cmd_schedule(interval_secs: Option<u64>) -> Result<()> {
    let orchestrator = Arc::new(orchestrator()?);
    let handle = maybe_start_scheduler(Some(orchestrator), interval_secs)
        .context("Scheduler not started: not every pipeline client is configured (see `catalog-indexer health`)")?;

    println!("Scheduler running. Press Ctrl-C to stop.");
    tokio::select! {
        _ = handle => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nStopping scheduler.");
        }
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let settings = load_settings()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!(
        "  Base URI: {}",
        settings.base_uri.as_deref().unwrap_or("Not set").cyan()
    );
    match settings.pipeline_config() {
        Ok(config) => {
            println!("  Page size: {}", config.page_size);
            println!("  Poll interval: {}s", config.poll_interval.as_secs());
            println!("  Job timeout: {}s", config.job_timeout.as_secs());
            println!("  Schedule interval: {}s", config.schedule_interval.as_secs());
        }
        Err(e) => println!("  {}", e.to_string().red()),
    }
    println!("  Local root: {}", show(settings.fs_root.as_ref().map(|p| p.display().to_string())));
    println!("  Database: {}", set_or_not(settings.database_url.is_some()));
    println!("  Qdrant: {}", show(settings.qdrant_url.clone()));
    println!("  GCP project: {}", show(settings.gcp_project.clone()));
    println!("  Access token: {}", set_or_not(settings.google_access_token.is_some()));

    Ok(())
}

// ============================================
// Output
// ============================================

fn show(value: Option<String>) -> String {
    value.unwrap_or_else(|| "None".to_string())
}

fn set_or_not(set: bool) -> colored::ColoredString {
    if set {
        "Set".green()
    } else {
        "Not set".red()
    }
}

fn colored_state(state: JobState) -> colored::ColoredString {
    match state {
        JobState::Succeeded => state.to_string().green(),
        JobState::Failed | JobState::Cancelled => state.to_string().red(),
        JobState::Pending | JobState::Running => state.to_string().yellow(),
    }
}

fn print_job(outcome: &EmbeddingOutcome) {
    println!("Job {} [{}]", outcome.job_name.cyan(), colored_state(outcome.state));
    if let Some(uri) = &outcome.output_uri {
        println!("  output: {}", uri.to_string().dimmed());
    }
}

fn print_result(result: &PipelineResult) {
    let status = if result.success {
        "SUCCESS".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} [{}] {}ms",
        "Run".bold(),
        result.run_id.to_string().cyan(),
        status,
        result.duration_ms
    );

    if let Some(stage) = result.failed_stage {
        println!("  failed at: {}", stage.to_string().red());
    }
    if let Some(message) = &result.error_message {
        println!("  error: {}", message.red());
    }
    if let Some(count) = result.exported_count {
        println!(
            "  exported: {} ({} skipped)",
            count,
            result.export_failed_count.unwrap_or(0)
        );
    }
    if let Some(job) = &result.job_name {
        let state = result
            .job_state
            .map(|s| colored_state(s).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  job: {} [{}]", job.dimmed(), state);
    }
    if let Some(count) = result.transformed_count {
        println!(
            "  transformed: {} ({} skipped)",
            count,
            result.transform_failed_count.unwrap_or(0)
        );
    }
    if let Some(resource) = &result.index_resource_id {
        println!("  index: {}", resource.cyan());
    }
}
