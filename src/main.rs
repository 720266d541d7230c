use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use steam_reviews::apis::steam_reviews::SteamReviewDownloader;
use steam_reviews::apis::steam_store::SteamStoreClient;
use steam_reviews::config::Config;
use steam_reviews::ledger::{Ledger, LedgerPaths};
use steam_reviews::pipeline::{ClassificationSummary, Pipeline};
use steam_reviews::types::{AppId, DispatchReport};
use steam_reviews::{constants, logging, metrics};

#[derive(Parser)]
#[command(name = "steam_reviews")]
#[command(about = "Classifies Steam store apps and downloads reviews for every game")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (optional)
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory holding the ledger files (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for rotated JSON logs
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the whole catalog, then download reviews for every game
    Run {
        /// Only classify the first N catalog entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Classify the catalog without downloading reviews
    Classify {
        /// Only classify the first N catalog entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Download reviews only (comma-separated ids, default: every game in the ledger)
    Download {
        #[arg(long, value_delimiter = ',')]
        app_ids: Vec<AppId>,
    },
}

fn print_classification(summary: &ClassificationSummary) {
    println!("\n📊 Classification results:");
    println!("   Apps checked: {}", summary.total_apps);
    println!("   Games: {}", summary.games.len());
    println!("   Not games: {}", summary.non_games);
    println!("   Unclassified: {}", summary.unclassified);
    if !summary.failed.is_empty() {
        println!("   ⚠️  Gave up on {} apps (retried next run)", summary.failed.len());
    }
}

fn print_dispatch(report: &DispatchReport) {
    println!("\n📊 Review download results:");
    println!("   Apps downloaded: {}", report.apps_downloaded);
    println!("   New reviews stored: {}", report.reviews_stored);
    if !report.failures.is_empty() {
        println!("\n⚠️  Failures:");
        for (id, reason) in &report.failures {
            println!("   - {}: {}", id, reason);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.log_dir);
    metrics::init_metrics();

    let mut config = Config::load_from(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.ledger.data_dir = dir;
    }

    let paths = LedgerPaths::from_config(&config.ledger);
    let mut ledger = Ledger::open(paths).context("opening the classification ledger")?;
    let counts = ledger.counts();
    info!(
        "Ledger has {} games, {} non-games, {} unclassified",
        counts.games, counts.non_games, counts.unclassified
    );

    let store = Arc::new(SteamStoreClient::new(&config.steam)?);
    let downloader = Arc::new(SteamReviewDownloader::new(
        &config.steam,
        config.reviews.clone(),
        config.retry_policy(),
    )?);

    match cli.command {
        Commands::Run { limit } => {
            println!("🚀 Running full pipeline (classify + download)...");
            let pipeline = Pipeline::new(store.clone(), store, downloader, config.retry_policy())
                .track_unclassified(config.ledger.track_unclassified)
                .limit(limit);
            let result = pipeline.run(&mut ledger).await.map_err(|e| {
                error!("Pipeline failed: {}", e);
                e
            })?;
            print_classification(&result.classification);
            print_dispatch(&result.dispatch);
        }
        Commands::Classify { limit } => {
            println!("🔎 Classifying catalog...");
            let pipeline = Pipeline::new(store.clone(), store, downloader, config.retry_policy())
                .track_unclassified(config.ledger.track_unclassified)
                .limit(limit);
            let summary = pipeline.classify_catalog(&mut ledger).await?;
            print_classification(&summary);
        }
        Commands::Download { app_ids } => {
            let ids = if app_ids.is_empty() {
                let mut ids: Vec<AppId> = ledger.games().collect();
                ids.sort();
                ids
            } else {
                app_ids
            };
            let pipeline = Pipeline::new(store.clone(), store, downloader, config.retry_policy());
            let report = pipeline.dispatch_review_download(&ids).await?;
            print_dispatch(&report);
        }
    }
    Ok(())
}
