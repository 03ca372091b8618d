//! The screening pipeline: fetch → normalize → score → rank → format → deliver.

use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;

use crate::error::ScreenerError;
use crate::find_tickers::TickerSource;
use crate::normalizer::{self, Field, NormalizeStats};
use crate::ranker::{self, ScoreKind};
use crate::report;
use crate::scorer::{self, ScoredRow};
use crate::storage_utils::{AppConfig, ModeConfig};
use crate::telegram::DeliverySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Top bullish and bearish trend candidates
    Screen,
    /// Reversal ("whale trap") candidates
    Trap,
}

impl Mode {
    /// Fields a row needs in this mode, besides the symbol.
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            Mode::Screen => &[Field::PriceChange24h, Field::Rsi, Field::Cci, Field::Momentum],
            Mode::Trap => &[Field::PriceChange24h, Field::PriceChange7d, Field::Rsi, Field::Cci],
        }
    }

    pub fn profile(self, config: &AppConfig) -> &ModeConfig {
        match self {
            Mode::Screen => &config.screen,
            Mode::Trap => &config.trap,
        }
    }

    pub fn export_file_name(self) -> &'static str {
        match self {
            Mode::Screen => "screener_report.csv",
            Mode::Trap => "trap_report.csv",
        }
    }

    /// Ranked sections this mode reports on.
    pub fn sections(self) -> &'static [ScoreKind] {
        match self {
            Mode::Screen => &[ScoreKind::Bullish, ScoreKind::Bearish],
            Mode::Trap => &[ScoreKind::Trap],
        }
    }
}

/// One normalized and scored batch.
#[derive(Debug)]
pub struct Screening {
    pub mode: Mode,
    pub rows: Vec<ScoredRow>,
    pub stats: NormalizeStats,
}

impl Screening {
    pub fn top(&self, kind: ScoreKind, n: usize) -> Vec<&ScoredRow> {
        ranker::rank(&self.rows, kind, n)
    }

    pub fn digest(&self, config: &AppConfig, generated_at: DateTime<Utc>) -> String {
        match self.mode {
            Mode::Screen => report::screen_digest(
                &self.rows,
                config.report.top_n,
                config.report.trailer.as_deref(),
                generated_at,
            ),
            Mode::Trap => report::trap_digest(&self.rows, config.report.top_n, generated_at),
        }
    }

    pub fn export(&self) -> Result<Vec<u8>, ScreenerError> {
        report::export_csv(&self.rows)
    }
}

/// Normalizes and scores a raw payload. No I/O.
pub fn screen(payload: &Value, config: &AppConfig, mode: Mode) -> Result<Screening, ScreenerError> {
    let normalized = normalizer::normalize(
        payload,
        &config.source,
        mode.profile(config),
        mode.required_fields(),
    )?;

    let stats = normalized.stats;
    info!(
        "Normalized {} of {} records ({} filtered, {} incomplete, {} duplicate, {} over cap)",
        normalized.rows.len(),
        stats.received,
        stats.filtered_out,
        stats.dropped_incomplete,
        stats.duplicates,
        stats.capped
    );

    let rows = scorer::score_all(normalized.rows, &config.thresholds);
    Ok(Screening { mode, rows, stats })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: Mode,
    pub scored: usize,
    pub stats: NormalizeStats,
}

/// Runs the pipeline once and delivers the digest and the CSV export.
///
/// Nothing is sent when fetching or normalizing fails. A delivery failure is
/// returned as-is, without retry.
pub async fn run_once(
    source: &dyn TickerSource,
    sink: &dyn DeliverySink,
    chat_id: &str,
    config: &AppConfig,
    mode: Mode,
) -> Result<RunSummary, ScreenerError> {
    info!("--- Step 1: Fetching tickers from {} ---", source.describe());
    let payload = source.fetch_tickers().await?;

    info!("--- Step 2: Normalizing and scoring ({:?}) ---", mode);
    let screening = screen(&payload, config, mode)?;

    info!("--- Step 3: Formatting report ---");
    let digest = screening.digest(config, Utc::now());
    let export = screening.export()?;

    info!("--- Step 4: Delivering to chat {} ---", chat_id);
    sink.send_text(chat_id, &digest).await?;
    sink.send_document(chat_id, mode.export_file_name(), export).await?;

    Ok(RunSummary {
        mode,
        scored: screening.rows.len(),
        stats: screening.stats,
    })
}
