use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use salewatch::engine::ReconciliationEngine;
use salewatch::logging::init_tracing;
use salewatch::notify::LogNotifier;
use salewatch::prefs::SqlitePreferences;
use salewatch::providers::{IgdbClient, SteamClient};
use salewatch::scrape::WishlistScraper;
use salewatch::store::{CatalogStore, MemoryStore, SqliteStore, StoreMode};
use salewatch::util::env as env_util;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "salewatch", version, about = "Wishlist sale watcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run a single reconciliation cycle and exit
    Run,
    /// Run reconciliation cycles forever on a fixed interval
    Watch {
        /// Seconds between cycles (overrides CYCLE_INTERVAL_SECS)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("salewatch=info,warn")?;
    let cli = Cli::parse();

    let mode = StoreMode::from_env();
    let sqlite_path =
        env_util::env_opt("SQLITE_PATH").unwrap_or_else(|| "salewatch.db".to_string());
    let store: Arc<dyn CatalogStore> = match mode {
        StoreMode::Cycle => Arc::new(MemoryStore::new()),
        StoreMode::Persistent => Arc::new(SqliteStore::open(&sqlite_path)?),
    };
    let prefs = SqlitePreferences::open(&sqlite_path)?;
    let notifier = LogNotifier;

    let engine = ReconciliationEngine::new(
        Arc::new(WishlistScraper::new_from_env()?),
        Arc::new(IgdbClient::new_from_env()?),
        Arc::new(SteamClient::new_from_env()?),
        store,
        mode,
    );

    match cli.command {
        Commands::Run => {
            engine.run_cycle(&prefs, &notifier).await?;
        }
        Commands::Watch { interval_secs } => {
            let interval = interval_secs
                .unwrap_or_else(|| env_util::env_parse("CYCLE_INTERVAL_SECS", 21_600u64));
            info!(interval_secs = interval, store_mode = ?mode, "starting watch loop");
            loop {
                if let Err(err) = engine.run_cycle(&prefs, &notifier).await {
                    error!(error = ?err, "reconciliation cycle failed");
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }
    Ok(())
}
