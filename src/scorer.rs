//! Rule-based bullish, bearish and trap scoring
//!
//! Every satisfied rule adds one point. Scores are heuristics rather than
//! calibrated signals, so ties are common and the ranker keeps them stable.

use serde::{Deserialize, Serialize};

use crate::normalizer::AssetRow;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BullishThresholds {
    pub rsi_above: f64,
    pub cci_above: f64,
    pub momentum_above: f64,
    pub change_24h_above: f64,
    pub volume_floor: f64,
    /// Count the surge combo as a sixth bullish point.
    pub count_surge: bool,
}

impl Default for BullishThresholds {
    fn default() -> Self {
        Thresholds::preset(ThresholdPreset::Lowered).bullish
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BearishThresholds {
    pub rsi_below: f64,
    pub cci_below: f64,
    pub momentum_below: f64,
    pub change_24h_below: f64,
    pub volume_ceiling: f64,
}

impl Default for BearishThresholds {
    fn default() -> Self {
        Thresholds::preset(ThresholdPreset::Lowered).bearish
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrapThresholds {
    /// Exclusive bounds on the 7-day change.
    pub change_7d_min: f64,
    pub change_7d_max: f64,
    pub change_24h_below: f64,
    pub rsi_below: f64,
    pub cci_below: f64,
    pub btc_correlation_abs_below: f64,
}

impl Default for TrapThresholds {
    fn default() -> Self {
        Thresholds::preset(ThresholdPreset::Lowered).trap
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TagThresholds {
    pub enabled: bool,
    pub freeze_momentum_abs_below: f64,
    pub freeze_change_abs_below: f64,
    pub wick_rsi_above: f64,
    pub wick_change_below: f64,
    pub surge_volume_above: f64,
    pub surge_change_above: f64,
    pub surge_rsi_below: f64,
}

impl Default for TagThresholds {
    fn default() -> Self {
        Thresholds::preset(ThresholdPreset::Lowered).tags
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub bullish: BullishThresholds,
    pub bearish: BearishThresholds,
    pub trap: TrapThresholds,
    pub tags: TagThresholds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::preset(ThresholdPreset::Lowered)
    }
}

/// The two threshold variants in use. `Lowered` widens the bullish volume
/// floor to 2M and turns on pattern tags; `Strict` keeps the 10M floor and
/// scores without tags.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPreset {
    Lowered,
    Strict,
}

impl Thresholds {
    pub fn preset(preset: ThresholdPreset) -> Self {
        let lowered = preset == ThresholdPreset::Lowered;
        Self {
            bullish: BullishThresholds {
                rsi_above: 60.0,
                cci_above: 100.0,
                momentum_above: 0.1,
                change_24h_above: 2.0,
                volume_floor: if lowered { 2_000_000.0 } else { 10_000_000.0 },
                count_surge: lowered,
            },
            bearish: BearishThresholds {
                rsi_below: 40.0,
                cci_below: -100.0,
                momentum_below: -0.1,
                change_24h_below: -2.0,
                volume_ceiling: 1_000_000.0,
            },
            trap: TrapThresholds {
                change_7d_min: 5.0,
                change_7d_max: 40.0,
                change_24h_below: 0.0,
                rsi_below: 50.0,
                cci_below: 0.0,
                btc_correlation_abs_below: 0.3,
            },
            tags: TagThresholds {
                enabled: lowered,
                freeze_momentum_abs_below: 0.02,
                freeze_change_abs_below: 1.0,
                wick_rsi_above: 65.0,
                wick_change_below: -2.0,
                surge_volume_above: 0.0,
                surge_change_above: 1.5,
                surge_rsi_below: 60.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternTags {
    pub freeze_pattern: bool,
    pub trap_wick: bool,
    pub surge_alert: bool,
}

impl PatternTags {
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.freeze_pattern {
            labels.push("🧊 Freeze");
        }
        if self.trap_wick {
            labels.push("⚠️ Trap Wick");
        }
        if self.surge_alert {
            labels.push("🚀 Surge Alert");
        }
        labels
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row: AssetRow,
    pub bullish_score: u8,
    pub bearish_score: u8,
    pub trap_score: u8,
    pub tags: PatternTags,
}

fn points(conditions: &[bool]) -> u8 {
    conditions.iter().filter(|hit| **hit).count() as u8
}

fn is_surge(row: &AssetRow, t: &TagThresholds) -> bool {
    row.volume_for_bullish() > t.surge_volume_above
        && row.price_change_24h > t.surge_change_above
        && row.rsi < t.surge_rsi_below
}

pub fn bullish_score(row: &AssetRow, thresholds: &Thresholds) -> u8 {
    let t = &thresholds.bullish;
    points(&[
        row.rsi > t.rsi_above,
        row.cci > t.cci_above,
        row.momentum.is_some_and(|m| m > t.momentum_above),
        row.price_change_24h > t.change_24h_above,
        row.volume_for_bullish() > t.volume_floor,
        t.count_surge && is_surge(row, &thresholds.tags),
    ])
}

pub fn bearish_score(row: &AssetRow, thresholds: &Thresholds) -> u8 {
    let t = &thresholds.bearish;
    points(&[
        row.rsi < t.rsi_below,
        row.cci < t.cci_below,
        row.momentum.is_some_and(|m| m < t.momentum_below),
        row.price_change_24h < t.change_24h_below,
        row.volume_for_bearish() < t.volume_ceiling,
    ])
}

pub fn trap_score(row: &AssetRow, thresholds: &Thresholds) -> u8 {
    let t = &thresholds.trap;
    points(&[
        row.price_change_7d
            .is_some_and(|c| c > t.change_7d_min && c < t.change_7d_max),
        row.price_change_24h < t.change_24h_below,
        row.rsi < t.rsi_below,
        row.cci < t.cci_below,
        row.btc_correlation_or_default().abs() < t.btc_correlation_abs_below,
    ])
}

pub fn pattern_tags(row: &AssetRow, thresholds: &Thresholds) -> PatternTags {
    let t = &thresholds.tags;
    if !t.enabled {
        return PatternTags::default();
    }
    PatternTags {
        freeze_pattern: row
            .momentum
            .is_some_and(|m| m.abs() < t.freeze_momentum_abs_below)
            && row.price_change_24h.abs() < t.freeze_change_abs_below,
        trap_wick: row.rsi > t.wick_rsi_above && row.price_change_24h < t.wick_change_below,
        surge_alert: is_surge(row, t),
    }
}

/// Attaches all scores and tags to a row.
pub fn score(row: AssetRow, thresholds: &Thresholds) -> ScoredRow {
    ScoredRow {
        bullish_score: bullish_score(&row, thresholds),
        bearish_score: bearish_score(&row, thresholds),
        trap_score: trap_score(&row, thresholds),
        tags: pattern_tags(&row, thresholds),
        row,
    }
}

pub fn score_all(rows: Vec<AssetRow>, thresholds: &Thresholds) -> Vec<ScoredRow> {
    rows.into_iter().map(|row| score(row, thresholds)).collect()
}
