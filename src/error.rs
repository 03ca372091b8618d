use thiserror::Error;

/// Failures that end a pipeline run.
///
/// Records with missing fields are not represented here: the normalizer drops
/// them and keeps going.
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("failed to fetch market data: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("upstream payload is not a list of ticker records")]
    MalformedPayload,

    #[error("delivery request failed: {0}")]
    Delivery(#[source] reqwest::Error),

    #[error("delivery rejected by Telegram: {0}")]
    DeliveryRejected(String),

    #[error("missing delivery credential: {0}")]
    MissingCredentials(&'static str),

    #[error("failed to build export: {0}")]
    Export(#[from] csv::Error),
}

impl ScreenerError {
    /// True for failures that happen before anything was sent.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::MalformedPayload)
    }
}
