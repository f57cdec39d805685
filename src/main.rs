//! Command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use relatoria::config::ExtractorConfig;
use relatoria::pipeline::analysis::{providers_from_env, AnalysisOrchestrator, AnalysisQueue};
use relatoria::pipeline::duplicate::InMemoryStore;
use relatoria::pipeline::fetch::{self, DocumentFetcher, FetchOutcome};
use relatoria::pipeline::page::HttpPageDriver;
use relatoria::pipeline::{identifier, Pipeline, PipelineError};

#[derive(Parser)]
#[command(name = "relatoria", version, about = "Acquire and analyze Constitutional Court opinions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full acquisition pass over the recent publication window.
    Run {
        /// Maximum candidates to process.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Search the extended window regardless of store state.
        #[arg(long)]
        extended: bool,

        /// Override the document cache directory.
        #[arg(long)]
        download_dir: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Discover and fetch but skip LLM analysis.
        #[arg(long)]
        dry_run: bool,
    },

    /// Download and verify a single document.
    Download {
        /// Canonical or raw identifier, e.g. "T-373/25".
        #[arg(long, conflicts_with = "url")]
        id: Option<String>,

        /// Explicit document URL.
        #[arg(long)]
        url: Option<String>,

        /// Publication year, used to build the URL from an identifier.
        #[arg(long, default_value_t = 2025)]
        year: i32,

        /// Directory to write the document into.
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Provider credentials commonly live in a local .env during development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("relatoria=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Command::Run {
            limit,
            extended,
            download_dir,
            date,
            dry_run,
        } => {
            let mut config = ExtractorConfig::default();
            if let Some(dir) = download_dir {
                config.cache_dir = dir;
            }

            let driver = HttpPageDriver::new(&config.user_agent, config.http_timeout_secs);
            let store = InMemoryStore::new();

            let orchestrator = if dry_run {
                None
            } else {
                let providers = providers_from_env();
                if providers.is_empty() {
                    tracing::warn!("No provider credentials set, records will be deterministic-only");
                    None
                } else {
                    Some(AnalysisOrchestrator::new(AnalysisQueue::start(
                        providers,
                        config.queue_delay_ms,
                    )))
                }
            };

            let reference = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let pipeline = Pipeline::new(&config, &driver, &store, orchestrator.as_ref());
            let summary = pipeline.run(reference, limit, extended)?;

            println!(
                "{}",
                serde_json::to_string_pretty(&summary).expect("summary serializes")
            );
            Ok(())
        }

        Command::Download {
            id,
            url,
            year,
            download_dir,
        } => {
            let mut config = ExtractorConfig::default();
            if let Some(dir) = download_dir {
                config.cache_dir = dir;
            }

            let (canonical, url) = match (id, url) {
                (Some(raw), _) => {
                    let canonical = identifier::normalize(&raw).ok_or_else(|| {
                        PipelineError::NotFound(format!("not a sentence identifier: {raw}"))
                    })?;
                    let url = config.document_url(&canonical, year);
                    (canonical, url)
                }
                (None, Some(url)) => {
                    let canonical = identifier::find_in_text(&url).ok_or_else(|| {
                        PipelineError::NotFound(format!("no identifier in URL: {url}"))
                    })?;
                    (canonical, url)
                }
                (None, None) => {
                    return Err(PipelineError::NotFound(
                        "either --id or --url is required".to_string(),
                    ));
                }
            };

            let fetcher = DocumentFetcher::new(&config);
            match fetcher.fetch_url(&url)? {
                FetchOutcome::Fetched(document) => {
                    let path = fetch::download_to(&config.cache_dir, &canonical, &document)?;
                    println!("{}", path.display());
                    Ok(())
                }
                FetchOutcome::NotFound => Err(PipelineError::NotFound(url)),
                FetchOutcome::Rejected { reason } => {
                    Err(PipelineError::VerificationRejected(reason))
                }
            }
        }
    }
}
