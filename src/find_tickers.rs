use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::ScreenerError;
use crate::storage_utils::SourceConfig;

/// Upstream market data. Implementations hand back the raw payload; shape
/// checks belong to the normalizer.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_tickers(&self) -> Result<Value, ScreenerError>;

    /// Short label for logging
    fn describe(&self) -> String;
}

/// Binance 24h rolling-window ticker statistics.
pub struct BinanceTickerSource {
    client: Client,
    url: String,
}

impl BinanceTickerSource {
    pub fn new(config: &SourceConfig) -> Result<Self, ScreenerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ScreenerError::Fetch)?;
        Ok(Self {
            client,
            url: config.ticker_url.clone(),
        })
    }
}

#[async_trait]
impl TickerSource for BinanceTickerSource {
    async fn fetch_tickers(&self) -> Result<Value, ScreenerError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ScreenerError::Fetch)?;

        // Parse into a generic Value: the ticker shape differs between spot
        // and futures endpoints.
        let payload: Value = response.json().await.map_err(ScreenerError::Fetch)?;

        if let Some(records) = payload.as_array() {
            info!("Fetched {} ticker records from {}", records.len(), self.url);
        }
        Ok(payload)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
