// In app/src/main.rs

use anyhow::Result;
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::{Granularity, Instrument};
use database::{MemoryStore, RuleStore};
use engine::Engine;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

mod replay;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Evaluates candles against the CaptainAmerica and IronMan trade rules.")]
struct Cli {
    /// The pair list to evaluate.
    #[arg(long, default_value = "config/live.toml")]
    live_config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Applies database migrations to the rule state store.
    Migrate,

    /// Records a new swing high/low as the current IronMan target.
    Swing {
        /// The instrument (e.g., "EURUSD").
        #[arg(short, long)]
        instrument: String,

        /// The granularity (e.g., "M5", "H1").
        #[arg(short, long)]
        granularity: Granularity,

        #[arg(long)]
        high: Decimal,

        #[arg(long)]
        low: Decimal,
    },

    /// Replays recorded candles through the rules and prints the resulting events.
    Replay {
        /// JSON file with `swings` and `candles`.
        file: PathBuf,

        /// Use a throwaway in-memory store instead of PostgreSQL.
        #[arg(long)]
        in_memory: bool,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings()?;
    init_tracing(&settings);

    tracing::info!(environment = %settings.app.environment, "Starting rule runner");

    match cli.command {
        Commands::Migrate => {
            database::connect(&settings.database).await?;
            tracing::info!("Migrations applied.");
        }
        Commands::Swing { instrument, granularity, high, low } => {
            let store = database::connect(&settings.database).await?;
            let seed = replay::SwingSeed { instrument: Instrument(instrument), granularity, high, low };
            replay::seed_swings(&store, std::slice::from_ref(&seed)).await?;
        }
        Commands::Replay { file, in_memory } => {
            let store: Arc<dyn RuleStore> = if in_memory {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(database::connect(&settings.database).await?)
            };
            handle_replay(&cli.live_config, &file, &settings, store).await?;
        }
    }

    tracing::info!("Rule runner has finished successfully.");

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::filter::Targets::new()
                .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
                .with_default(level),
        );
    tracing_subscriber::registry().with(fmt_layer).init();
}

async fn handle_replay(
    live_config: &Path,
    file: &Path,
    settings: &Settings,
    store: Arc<dyn RuleStore>,
) -> Result<()> {
    let live_config = app_config::load_live_config(live_config)?;
    let recorded = replay::load(file)?;
    tracing::info!(
        swings = recorded.swings.len(),
        candles = recorded.candles.len(),
        "Replay file loaded."
    );

    replay::seed_swings(store.as_ref(), &recorded.swings).await?;

    let engine = Engine::new(&live_config, &settings.trading, store)?;
    let events = engine.replay(recorded.candles).await?;

    // One JSON object per line on stdout; logs go to stderr.
    for event in &events {
        let context = event.context();
        tracing::debug!(
            rule = %context.rule,
            instrument = %context.instrument,
            time = %context.time,
            "Emitting rule event."
        );
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
