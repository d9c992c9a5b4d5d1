use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dataset;
mod error;
mod judge;
mod judge_ranker;
mod models;
mod output;
mod providers;
mod ranker;
mod runner;
mod similarity;
mod templates;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::providers::{OpenAiCompletionProvider, OpenAiEmbeddingProvider};
use crate::runner::{Mode, Runner};
use crate::templates::TemplateKind;

/// Prompt ranker - generate, rank and evaluate story prompts with an LLM
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input CSV with `Prompt`, `Human Story` and optional `Response N` columns
    #[arg(long = "input_csv")]
    input_csv: PathBuf,

    /// Where to write the output CSV
    #[arg(long = "output_csv")]
    output_csv: PathBuf,

    /// What to do with each row
    #[arg(short, long, value_enum, default_value = "embedding")]
    mode: Mode,

    /// Path to a TOML configuration file; defaults are used without one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template used by `generate` mode, overriding the config file
    #[arg(short, long, value_enum)]
    template: Option<TemplateKind>,

    /// Summary format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every API request
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "prompt_ranker=debug"
    } else {
        "prompt_ranker=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Error message for an input path that does not exist
fn missing_input(path: &Path) -> Option<String> {
    if path.exists() {
        None
    } else {
        Some(format!("Error: Input file '{}' does not exist.", path.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Some(message) = missing_input(&args.input_csv) {
        eprintln!("{}", message);
        std::process::exit(1);
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(template) = args.template {
        config.template = template;
    }

    let data = dataset::load_rows(&args.input_csv, args.mode.needs_responses())
        .with_context(|| format!("Failed to load dataset: {}", args.input_csv.display()))?;

    let completion = Arc::new(OpenAiCompletionProvider::from_config(&config)?);
    let embedding = Arc::new(OpenAiEmbeddingProvider::from_config(&config)?);
    let runner = Runner::new(config, args.mode, completion, embedding);

    let (table, summary) = runner.run(&data).await?;

    output::write_table(&args.output_csv, &table)?;
    output::print_summary(&summary, args.output);

    Ok(())
}
