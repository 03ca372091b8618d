use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::normalizer::IndicatorStandIn;
use crate::scorer::Thresholds;

// CONFIGURATION STRUCTS
// `config.json` deserializes straight into these types. Every section falls
// back to its default when left out of the file.

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub ticker_url: String,
    pub quote_asset: String, // e.g., "USDT"
    pub denylist: Vec<String>, // substrings that exclude a symbol
    pub filters: HashMap<String, String>, // e.g., "contractType" -> "PERPETUAL"
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ticker_url: "https://fapi.binance.com/fapi/v1/ticker/24hr".to_string(),
            quote_asset: "USDT".to_string(),
            denylist: vec!["BUSD".to_string(), ".".to_string()],
            filters: HashMap::from([("contractType".to_string(), "PERPETUAL".to_string())]),
            request_timeout_secs: 10,
        }
    }
}

/// Per-mode normalization profile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModeConfig {
    pub stand_in: IndicatorStandIn,
    pub symbol_suffix: Option<String>, // e.g., ".P"
    pub max_rows: Option<usize>,
}

impl ModeConfig {
    pub fn screen() -> Self {
        Self {
            stand_in: IndicatorStandIn::PriceDerived,
            symbol_suffix: None,
            max_rows: Some(100),
        }
    }

    pub fn trap() -> Self {
        Self {
            stand_in: IndicatorStandIn::SymbolHash,
            symbol_suffix: Some(".P".to_string()),
            max_rows: None,
        }
    }

    fn with_overrides(mut self, overrides: ModeOverrides) -> Self {
        if let Some(stand_in) = overrides.stand_in {
            self.stand_in = stand_in;
        }
        if let Some(symbol_suffix) = overrides.symbol_suffix {
            self.symbol_suffix = symbol_suffix;
        }
        if let Some(max_rows) = overrides.max_rows {
            self.max_rows = max_rows;
        }
        self
    }
}

/// A `screen`/`trap` section as written in `config.json`. Absent keys keep
/// that mode's built-in value; an explicit `null` clears an optional one.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ModeOverrides {
    stand_in: Option<IndicatorStandIn>,
    #[serde(deserialize_with = "present")]
    symbol_suffix: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    max_rows: Option<Option<usize>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn screen_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModeConfig, D::Error> {
    ModeOverrides::deserialize(deserializer).map(|o| ModeConfig::screen().with_overrides(o))
}

fn trap_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModeConfig, D::Error> {
    ModeOverrides::deserialize(deserializer).map(|o| ModeConfig::trap().with_overrides(o))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ReportConfig {
    pub top_n: usize,
    pub trailer: Option<String>, // free-form line appended to the screen digest
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            trailer: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub poll_timeout_secs: u64, // long-poll wait for getUpdates
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_secs: 15,
            poll_timeout_secs: 30,
        }
    }
}

/// Bot credentials. Read from the environment, never written to disk.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            chat_id: non_empty("TELEGRAM_CHAT_ID"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    // Nested structs organize the config logically
    pub source: SourceConfig,
    #[serde(deserialize_with = "screen_profile")]
    pub screen: ModeConfig,
    #[serde(deserialize_with = "trap_profile")]
    pub trap: ModeConfig,
    pub thresholds: Thresholds,
    pub report: ReportConfig,
    pub telegram: TelegramConfig,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            screen: ModeConfig::screen(),
            trap: ModeConfig::trap(),
            thresholds: Thresholds::default(),
            report: ReportConfig::default(),
            telegram: TelegramConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager whose directory sits next to the running binary.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// Creates a manager rooted at `base_dir`, creating the directory up front
    /// so later saves never have to check for it.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !fs::try_exists(&base_dir).await? {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// Serializes `data` to `<filename>.json` as pretty JSON.
    ///
    /// Writes to a `.tmp` sibling first and renames it over the target, so a
    /// crash mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates the bytes itself, no need for read_to_string
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Like [`load`](Self::load), but a missing file yields `T::default()`.
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        filename: &str,
    ) -> anyhow::Result<T> {
        if !fs::try_exists(self.path_for(filename)).await? {
            log::info!("{}.json not found in {:?}, using defaults", filename, self.base_dir);
            return Ok(T::default());
        }
        self.load(filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ThresholdPreset;

    #[tokio::test]
    async fn test_save_then_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path().join("storage")).await.unwrap();

        let mut config = AppConfig::default();
        config.report.top_n = 5;
        config.report.trailer = Some("PNL: $748".to_string());
        storage.save("config", &config).await.unwrap();

        let loaded: AppConfig = storage.load("config").await.unwrap();
        assert_eq!(loaded.report.top_n, 5);
        assert_eq!(loaded.report.trailer.as_deref(), Some("PNL: $748"));
        assert_eq!(loaded.trap, ModeConfig::trap());
        assert!(!dir.path().join("storage").join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();

        let config: AppConfig = storage.load_or_default("config").await.unwrap();
        assert_eq!(config.report.top_n, 10);
        assert_eq!(config.source.quote_asset, "USDT");
        assert_eq!(config.screen, ModeConfig::screen());
    }

    #[tokio::test]
    async fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        let partial = r#"{
            "report": { "top_n": 3 },
            "thresholds": { "bullish": { "volume_floor": 10000000.0 } }
        }"#;
        tokio::fs::write(dir.path().join("config.json"), partial).await.unwrap();

        let config: AppConfig = storage.load_or_default("config").await.unwrap();
        assert_eq!(config.report.top_n, 3);
        assert_eq!(config.report.trailer, None);
        assert_eq!(config.thresholds.bullish.volume_floor, 10_000_000.0);
        assert_eq!(config.thresholds.bullish.rsi_above, 60.0);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(
            config.thresholds.bearish,
            Thresholds::preset(ThresholdPreset::Lowered).bearish
        );
    }

    #[tokio::test]
    async fn test_partial_mode_sections_keep_mode_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AsyncStorageManager::new(dir.path()).await.unwrap();
        let partial = r#"{
            "screen": { "max_rows": 50 },
            "trap": { "stand_in": "none", "max_rows": 20 }
        }"#;
        tokio::fs::write(dir.path().join("config.json"), partial).await.unwrap();

        let config: AppConfig = storage.load_or_default("config").await.unwrap();
        assert_eq!(
            config.screen,
            ModeConfig {
                max_rows: Some(50),
                ..ModeConfig::screen()
            }
        );
        assert_eq!(
            config.trap,
            ModeConfig {
                stand_in: IndicatorStandIn::None,
                symbol_suffix: Some(".P".to_string()),
                max_rows: Some(20),
            }
        );
    }

    #[test]
    fn test_null_clears_optional_mode_fields() {
        let raw = r#"{
            "screen": { "max_rows": null },
            "trap": { "symbol_suffix": null }
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.screen.max_rows, None);
        assert_eq!(config.screen.stand_in, IndicatorStandIn::PriceDerived);
        assert_eq!(config.trap.symbol_suffix, None);
        assert_eq!(config.trap.stand_in, IndicatorStandIn::SymbolHash);
    }

    #[test]
    fn test_credentials_from_lookup() {
        let creds = Credentials::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "TELEGRAM_CHAT_ID" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(creds.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(creds.chat_id, None);
    }

    #[test]
    fn test_credentials_never_serialized() {
        let mut config = AppConfig::default();
        config.credentials.bot_token = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
