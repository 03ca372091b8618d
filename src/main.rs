mod error;
#[cfg(test)]
mod fakes;
mod filter_utils;
mod find_tickers;
mod listener;
mod normalizer;
mod pipeline;
mod preview_table;
mod ranker;
mod report;
mod scorer;
mod storage_utils;
mod telegram;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use error::ScreenerError;
use find_tickers::{BinanceTickerSource, TickerSource};
use pipeline::Mode;
use scorer::{ThresholdPreset, Thresholds};
use storage_utils::{AppConfig, AsyncStorageManager, Credentials};
use telegram::TelegramBot;

#[derive(Parser)]
#[command(name = "trap-screener")]
#[command(about = "Binance futures screener with Telegram reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.json (default: `storage` next to the binary)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Replace the configured thresholds with a preset
    #[arg(long, global = true, value_enum)]
    preset: Option<ThresholdPreset>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and send the report to Telegram
    Run {
        #[arg(short, long, value_enum, default_value = "screen")]
        mode: Mode,

        /// Target chat (default: TELEGRAM_CHAT_ID)
        #[arg(long)]
        chat_id: Option<String>,
    },

    /// Run the pipeline once and print the result instead of sending it
    Preview {
        #[arg(short, long, value_enum, default_value = "screen")]
        mode: Mode,
    },

    /// Answer /screen and /trap commands sent to the bot
    Listen,

    /// Write the default config.json
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn apply_preset(config: &mut AppConfig, preset: Option<ThresholdPreset>) {
    if let Some(preset) = preset {
        info!("Using {:?} threshold preset", preset);
        config.thresholds = Thresholds::preset(preset);
    }
}

async fn load_config(
    storage: &AsyncStorageManager,
    preset: Option<ThresholdPreset>,
) -> anyhow::Result<AppConfig> {
    let mut config: AppConfig = storage
        .load_or_default("config")
        .await
        .with_context(|| format!("Failed to load config.json from {:?}", storage.base_dir))?;

    config.credentials = Credentials::from_env();
    apply_preset(&mut config, preset);
    Ok(config)
}

/// Writes the default config, with the preset's thresholds when one is given.
async fn init_config(
    storage: &AsyncStorageManager,
    preset: Option<ThresholdPreset>,
    force: bool,
) -> anyhow::Result<PathBuf> {
    let path = storage.base_dir.join("config.json");
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }

    let mut config = AppConfig::default();
    apply_preset(&mut config, preset);
    storage.save("config", &config).await?;
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let preset = cli.preset;

    let storage = match cli.storage {
        Some(dir) => AsyncStorageManager::new(dir).await?,
        None => AsyncStorageManager::new_relative("storage").await?,
    };

    match cli.command {
        Commands::InitConfig { force } => {
            let path = init_config(&storage, preset, force).await?;
            info!("Default config written to {:?}", path);
        }
        Commands::Run { mode, chat_id } => {
            let config = load_config(&storage, preset).await?;
            let source = BinanceTickerSource::new(&config.source)?;
            let chat_id = chat_id
                .or_else(|| config.credentials.chat_id.clone())
                .ok_or(ScreenerError::MissingCredentials("TELEGRAM_CHAT_ID"))?;
            let bot = TelegramBot::new(&config.telegram, &config.credentials)?;

            let summary = pipeline::run_once(&source, &bot, &chat_id, &config, mode)
                .await
                .context("Screening run failed")?;
            info!(
                "Report sent: {} of {} records scored ({:?})",
                summary.scored, summary.stats.received, summary.mode
            );
        }
        Commands::Preview { mode } => {
            let config = load_config(&storage, preset).await?;
            let source = BinanceTickerSource::new(&config.source)?;
            let payload = source
                .fetch_tickers()
                .await
                .context("Failed to fetch tickers")?;
            let screening = pipeline::screen(&payload, &config, mode)?;

            let now = Utc::now();
            preview_table::print_preview(&screening, config.report.top_n, now);
            println!("\n{}", screening.digest(&config, now));
        }
        Commands::Listen => {
            let config = load_config(&storage, preset).await?;
            let source = BinanceTickerSource::new(&config.source)?;
            let bot = TelegramBot::new(&config.telegram, &config.credentials)?;
            listener::listen(&config, &source, &bot).await?;
        }
    }

    Ok(())
}
