//! Maps raw exchange ticker records into canonical [`AssetRow`]s.

use log::{debug, warn};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::ScreenerError;
use crate::filter_utils::{is_tradable_symbol, matches_filters};
use crate::storage_utils::{ModeConfig, SourceConfig};

/// One traded symbol, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRow {
    pub symbol: String,
    pub price_change_24h: f64,
    pub price_change_7d: Option<f64>,
    pub rsi: f64,
    pub cci: f64,
    pub momentum: Option<f64>,
    pub volume_quote: Option<f64>,
    pub btc_correlation: Option<f64>,
}

/// Values substituted for absent optional fields. Each one is chosen so the
/// rule reading it does not trigger.
pub struct FieldDefaults {
    pub volume_for_bullish: f64,
    pub volume_for_bearish: f64,
    pub btc_correlation: f64,
}

pub const FIELD_DEFAULTS: FieldDefaults = FieldDefaults {
    volume_for_bullish: 0.0,
    volume_for_bearish: 10_000_000.0,
    btc_correlation: 0.0,
};

impl AssetRow {
    pub fn volume_for_bullish(&self) -> f64 {
        self.volume_quote.unwrap_or(FIELD_DEFAULTS.volume_for_bullish)
    }

    pub fn volume_for_bearish(&self) -> f64 {
        self.volume_quote.unwrap_or(FIELD_DEFAULTS.volume_for_bearish)
    }

    pub fn btc_correlation_or_default(&self) -> f64 {
        self.btc_correlation.unwrap_or(FIELD_DEFAULTS.btc_correlation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Symbol,
    PriceChange24h,
    PriceChange7d,
    Rsi,
    Cci,
    Momentum,
    VolumeQuote,
    BtcCorrelation,
}

impl Field {
    /// Upstream names accepted for this field, tried in order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Symbol => &["symbol", "Symbol"],
            Field::PriceChange24h => &["priceChangePercent", "Price Change % 24 hours"],
            Field::PriceChange7d => &["priceChangePercent7d", "Price Change % 7 days"],
            Field::Rsi => &["rsi", "Relative Strength Index (14) 1 day"],
            Field::Cci => &["cci", "Commodity Channel Index (20) 1 day"],
            Field::Momentum => &["momentum", "Momentum (10) 1 day"],
            Field::VolumeQuote => &["quoteVolume", "Volume USDT"],
            Field::BtcCorrelation => &["btcCorrelation", "BTC Correlation"],
        }
    }
}

/// Placeholder indicator generators. These are NOT market indicators: they
/// only fill indicator fields the upstream record does not carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStandIn {
    /// Require real indicator values in every record.
    None,
    /// RSI, CCI and momentum scaled from the 24h change.
    PriceDerived,
    /// 7d change, RSI, CCI and BTC correlation from a hash of the symbol.
    SymbolHash,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeStats {
    pub received: usize,
    pub filtered_out: usize,
    pub dropped_incomplete: usize,
    pub duplicates: usize,
    pub capped: usize,
}

#[derive(Debug)]
pub struct Normalized {
    pub rows: Vec<AssetRow>,
    pub stats: NormalizeStats,
}

// --- Lenient number parsing ---

/// Accepts floats, integers and numeric strings. Anything else is "missing".
struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.trim().parse::<f64>().ok())
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    Deserializer::deserialize_any(value, LenientF64Visitor)
        .ok()
        .flatten()
        .filter(|v| v.is_finite())
}

fn read_number(record: &Map<String, Value>, field: Field) -> Option<f64> {
    field
        .aliases()
        .iter()
        .find_map(|key| record.get(*key).and_then(lenient_f64))
}

fn read_symbol(record: &Map<String, Value>) -> Option<&str> {
    Field::Symbol
        .aliases()
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// --- Stand-in generation ---

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[derive(Debug, Default)]
struct RawFields {
    price_change_24h: Option<f64>,
    price_change_7d: Option<f64>,
    rsi: Option<f64>,
    cci: Option<f64>,
    momentum: Option<f64>,
    volume_quote: Option<f64>,
    btc_correlation: Option<f64>,
}

impl RawFields {
    fn read(record: &Map<String, Value>) -> Self {
        Self {
            price_change_24h: read_number(record, Field::PriceChange24h),
            price_change_7d: read_number(record, Field::PriceChange7d),
            rsi: read_number(record, Field::Rsi),
            cci: read_number(record, Field::Cci),
            momentum: read_number(record, Field::Momentum),
            volume_quote: read_number(record, Field::VolumeQuote),
            btc_correlation: read_number(record, Field::BtcCorrelation),
        }
    }

    /// Fills absent indicator fields. Values present upstream always win.
    fn fill_stand_ins(&mut self, symbol: &str, stand_in: IndicatorStandIn) {
        match stand_in {
            IndicatorStandIn::None => {}
            IndicatorStandIn::PriceDerived => {
                if let Some(change) = self.price_change_24h {
                    self.rsi.get_or_insert(50.0 + (change / 2.0).clamp(-25.0, 25.0));
                    self.cci.get_or_insert(change * 5.0);
                    self.momentum.get_or_insert(change / 100.0);
                }
            }
            IndicatorStandIn::SymbolHash => {
                let reversed: String = symbol.chars().rev().collect();
                let every_other: String = symbol.chars().step_by(2).collect();

                self.price_change_7d
                    .get_or_insert(10.0 + ((fnv1a(symbol) % 30) as f64 - 10.0));
                self.rsi.get_or_insert(30.0 + (fnv1a(&reversed) % 70) as f64);
                self.cci.get_or_insert(-100.0 + (fnv1a(&every_other) % 200) as f64);
                self.btc_correlation.get_or_insert(0.1);
            }
        }
    }

    fn is_present(&self, field: Field) -> bool {
        match field {
            Field::Symbol => true,
            Field::PriceChange24h => self.price_change_24h.is_some(),
            Field::PriceChange7d => self.price_change_7d.is_some(),
            Field::Rsi => self.rsi.is_some(),
            Field::Cci => self.cci.is_some(),
            Field::Momentum => self.momentum.is_some(),
            Field::VolumeQuote => self.volume_quote.is_some(),
            Field::BtcCorrelation => self.btc_correlation.is_some(),
        }
    }

    /// Builds the row, or `None` when a required field is missing.
    fn into_row(self, symbol: String, required: &[Field]) -> Option<AssetRow> {
        if !required.iter().all(|field| self.is_present(*field)) {
            return None;
        }
        Some(AssetRow {
            symbol,
            price_change_24h: self.price_change_24h?,
            price_change_7d: self.price_change_7d,
            rsi: self.rsi?,
            cci: self.cci?,
            momentum: self.momentum,
            volume_quote: self.volume_quote,
            btc_correlation: self.btc_correlation,
        })
    }
}

/// Turns an upstream payload into ordered, de-duplicated rows.
///
/// The payload must be a JSON array. Individual records that are filtered,
/// incomplete or duplicated are dropped and counted; they never fail the
/// batch. `required` lists fields a row must carry on top of the 24h change,
/// RSI and CCI every row needs.
pub fn normalize(
    payload: &Value,
    source: &SourceConfig,
    profile: &ModeConfig,
    required: &[Field],
) -> Result<Normalized, ScreenerError> {
    let records = payload.as_array().ok_or(ScreenerError::MalformedPayload)?;

    if profile.stand_in != IndicatorStandIn::None {
        warn!(
            "indicator values are placeholder stand-ins ({:?}), not computed market indicators",
            profile.stand_in
        );
    }

    let mut stats = NormalizeStats {
        received: records.len(),
        ..NormalizeStats::default()
    };
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let Some(map) = record.as_object() else {
            debug!("dropping non-object ticker record: {}", record);
            stats.dropped_incomplete += 1;
            continue;
        };
        let Some(raw_symbol) = read_symbol(map) else {
            debug!("dropping ticker record without a symbol");
            stats.dropped_incomplete += 1;
            continue;
        };

        if !is_tradable_symbol(raw_symbol, source) || !matches_filters(map, &source.filters) {
            stats.filtered_out += 1;
            continue;
        }

        let mut fields = RawFields::read(map);
        fields.fill_stand_ins(raw_symbol, profile.stand_in);

        let symbol = match &profile.symbol_suffix {
            Some(suffix) => format!("{}{}", raw_symbol, suffix),
            None => raw_symbol.to_string(),
        };

        let Some(row) = fields.into_row(symbol, required) else {
            debug!("dropping {}: missing required field", raw_symbol);
            stats.dropped_incomplete += 1;
            continue;
        };

        if !seen.insert(row.symbol.clone()) {
            stats.duplicates += 1;
            continue;
        }
        rows.push(row);
    }

    if let Some(max_rows) = profile.max_rows {
        if rows.len() > max_rows {
            stats.capped = rows.len() - max_rows;
            rows.truncate(max_rows);
        }
    }

    Ok(Normalized { rows, stats })
}
