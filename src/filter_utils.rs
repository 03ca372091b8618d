use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::storage_utils::SourceConfig;

/// Quote-asset and denylist check on the raw exchange symbol.
pub fn is_tradable_symbol(symbol: &str, source: &SourceConfig) -> bool {
    symbol.ends_with(&source.quote_asset)
        && !source
            .denylist
            .iter()
            .any(|banned| !banned.is_empty() && symbol.contains(banned.as_str()))
}

/// Field filters from the config. A record that carries the key must match
/// the required value; a record without the key is not filtered.
pub fn matches_filters(record: &Map<String, Value>, filters: &HashMap<String, String>) -> bool {
    filters.iter().all(|(key, required_value)| match record.get(key) {
        // e.g. "contractType": "PERPETUAL"
        Some(Value::String(s)) => s == required_value,
        // e.g. "underlyingSubType": ["PoW"]
        Some(Value::Array(arr)) => arr.iter().any(|v| v.as_str() == Some(required_value)),
        Some(Value::Null) | None => true,
        Some(v) => &v.to_string() == required_value,
    })
}
