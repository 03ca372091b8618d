//! Text digests and the CSV export sent alongside them.
//!
//! Presentation only: rows arrive already scored and ranked.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ScreenerError;
use crate::ranker::{self, ScoreKind};
use crate::scorer::ScoredRow;

pub const EXPORT_COLUMNS: &[&str] = &[
    "symbol",
    "price_change_24h",
    "price_change_7d",
    "rsi",
    "cci",
    "momentum",
    "volume_quote",
    "btc_correlation",
    "bullish_score",
    "bearish_score",
    "trap_score",
    "freeze_pattern",
    "trap_wick",
    "surge_alert",
];

#[derive(Serialize)]
struct ExportRecord<'a> {
    symbol: &'a str,
    price_change_24h: f64,
    price_change_7d: Option<f64>,
    rsi: f64,
    cci: f64,
    momentum: Option<f64>,
    volume_quote: Option<f64>,
    btc_correlation: Option<f64>,
    bullish_score: u8,
    bearish_score: u8,
    trap_score: u8,
    freeze_pattern: bool,
    trap_wick: bool,
    surge_alert: bool,
}

impl<'a> From<&'a ScoredRow> for ExportRecord<'a> {
    fn from(scored: &'a ScoredRow) -> Self {
        let row = &scored.row;
        Self {
            symbol: &row.symbol,
            price_change_24h: row.price_change_24h,
            price_change_7d: row.price_change_7d,
            rsi: row.rsi,
            cci: row.cci,
            momentum: row.momentum,
            volume_quote: row.volume_quote,
            btc_correlation: row.btc_correlation,
            bullish_score: scored.bullish_score,
            bearish_score: scored.bearish_score,
            trap_score: scored.trap_score,
            freeze_pattern: scored.tags.freeze_pattern,
            trap_wick: scored.tags.trap_wick,
            surge_alert: scored.tags.surge_alert,
        }
    }
}

/// Full batch as CSV, one line per row in normalized order. The header is
/// written even for an empty batch.
pub fn export_csv(rows: &[ScoredRow]) -> Result<Vec<u8>, ScreenerError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS)?;
    for row in rows {
        writer.serialize(ExportRecord::from(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| ScreenerError::Export(csv::Error::from(e.into_error())))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d-%m-%Y %H:%M:%S").to_string()
}

/// Volume in millions with one decimal, e.g. `$12.3M`.
pub fn format_volume(volume: f64) -> String {
    format!("${:.1}M", volume / 1_000_000.0)
}

fn trend_line(rank: usize, scored: &ScoredRow, kind: ScoreKind) -> String {
    let row = &scored.row;
    let mut line = format!(
        "{}. {} | {:+.2}% | RSI: {:.1} | Vol: {} | Score: {}",
        rank,
        row.symbol,
        row.price_change_24h,
        row.rsi,
        format_volume(row.volume_for_bullish()),
        kind.of(scored),
    );
    let labels = scored.tags.labels();
    if !labels.is_empty() {
        line.push(' ');
        line.push_str(&labels.join(" "));
    }
    line
}

fn trap_line(rank: usize, scored: &ScoredRow) -> String {
    let row = &scored.row;
    let change_7d = row
        .price_change_7d
        .map(|c| format!("{:.1}%", c))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{}. {} | 7D: {} | 24H: {:.1}% | RSI: {:.1} | CCI: {:.1} | Score: {}",
        rank, row.symbol, change_7d, row.price_change_24h, row.rsi, row.cci, scored.trap_score
    )
}

fn push_section(out: &mut String, title: &str, lines: Vec<String>) {
    out.push_str(title);
    out.push('\n');
    if lines.is_empty() {
        out.push_str("(no candidates)\n");
    }
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

pub fn screen_digest(
    rows: &[ScoredRow],
    top_n: usize,
    trailer: Option<&str>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("📊 Screener Report\n🕒 {} UTC\n", format_timestamp(generated_at)));
    out.push('\n');

    for (kind, title) in [
        (ScoreKind::Bullish, format!("🔥 Top {} Bullish Coins:", top_n)),
        (ScoreKind::Bearish, format!("❄️ Top {} Bearish Coins:", top_n)),
    ] {
        let lines = ranker::rank(rows, kind, top_n)
            .into_iter()
            .enumerate()
            .map(|(i, r)| trend_line(i + 1, r, kind))
            .collect();
        push_section(&mut out, &title, lines);
        out.push('\n');
    }

    if let Some(trailer) = trailer.filter(|t| !t.trim().is_empty()) {
        out.push_str(&format!("💰 {}\n", trailer));
    }

    out.trim_end().to_string()
}

pub fn trap_digest(rows: &[ScoredRow], top_n: usize, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "🕵️ Whale Trap Detector Report\n🕒 {} UTC\n",
        format_timestamp(generated_at)
    ));
    out.push('\n');

    let lines = ranker::rank(rows, ScoreKind::Trap, top_n)
        .into_iter()
        .enumerate()
        .map(|(i, r)| trap_line(i + 1, r))
        .collect();
    push_section(&mut out, &format!("💣 Top {} Trap Candidates:", top_n), lines);

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::AssetRow;
    use crate::scorer::{score, Thresholds};
    use chrono::TimeZone;

    fn asset(
        symbol: &str,
        rsi: f64,
        cci: f64,
        momentum: f64,
        change: f64,
        volume: Option<f64>,
    ) -> AssetRow {
        AssetRow {
            symbol: symbol.to_string(),
            price_change_24h: change,
            price_change_7d: None,
            rsi,
            cci,
            momentum: Some(momentum),
            volume_quote: volume,
            btc_correlation: None,
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn batch() -> Vec<ScoredRow> {
        let t = Thresholds::default();
        vec![
            score(asset("BTCUSDT", 65.0, 120.0, 0.15, 3.0, Some(5_000_000.0)), &t),
            score(asset("ETHUSDT", 35.0, -150.0, -0.35, -4.0, Some(900_000.0)), &t),
            score(asset("SOLUSDT", 55.0, 10.0, 0.05, 1.8, Some(1_240_000.0)), &t),
        ]
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(5_000_000.0), "$5.0M");
        assert_eq!(format_volume(1_240_000.0), "$1.2M");
        assert_eq!(format_volume(0.0), "$0.0M");
    }

    #[test]
    fn test_screen_digest_layout() {
        let digest = screen_digest(&batch(), 2, Some("PNL: $748"), fixed_time());
        let lines: Vec<&str> = digest.lines().collect();

        assert_eq!(lines[0], "📊 Screener Report");
        assert_eq!(lines[1], "🕒 01-05-2024 12:30:00 UTC");
        assert_eq!(lines[3], "🔥 Top 2 Bullish Coins:");
        assert_eq!(lines[4], "1. BTCUSDT | +3.00% | RSI: 65.0 | Vol: $5.0M | Score: 5");
        assert_eq!(
            lines[5],
            "2. SOLUSDT | +1.80% | RSI: 55.0 | Vol: $1.2M | Score: 1 🚀 Surge Alert"
        );
        assert_eq!(lines[7], "❄️ Top 2 Bearish Coins:");
        assert_eq!(lines[8], "1. ETHUSDT | -4.00% | RSI: 35.0 | Vol: $0.9M | Score: 5");
        assert_eq!(lines.last(), Some(&"💰 PNL: $748"));
    }

    #[test]
    fn test_screen_digest_without_trailer() {
        let digest = screen_digest(&batch(), 10, None, fixed_time());
        assert!(!digest.contains("💰"));
        assert!(digest.contains("🔥 Top 10 Bullish Coins:"));
    }

    #[test]
    fn test_empty_sections_are_explicit() {
        let digest = trap_digest(&[], 10, fixed_time());
        assert!(digest.ends_with("💣 Top 10 Trap Candidates:\n(no candidates)"));
    }

    #[test]
    fn test_trap_digest_lines() {
        let t = Thresholds::default();
        let mut trap = asset("ARBUSDT.P", 45.0, -20.0, 0.0, -1.0, None);
        trap.price_change_7d = Some(12.0);
        trap.btc_correlation = Some(0.1);
        let rows = vec![score(trap, &t)];

        let digest = trap_digest(&rows, 10, fixed_time());
        assert!(digest.contains(
            "1. ARBUSDT.P | 7D: 12.0% | 24H: -1.0% | RSI: 45.0 | CCI: -20.0 | Score: 5"
        ));
    }

    #[test]
    fn test_export_has_header_and_every_row() {
        let csv_bytes = export_csv(&batch()).unwrap();
        let text = String::from_utf8(csv_bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], EXPORT_COLUMNS.join(","));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("BTCUSDT,3.0,,65.0,120.0,0.15,5000000.0,,5,0,"));
        assert!(lines[3].ends_with(",false,false,true"));
    }

    #[test]
    fn test_export_of_empty_batch_keeps_header() {
        let text = String::from_utf8(export_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), EXPORT_COLUMNS.join(","));
    }
}
