use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

// CONFIGURATION STRUCTS
// Every field has a default so a partial (or missing) config.json still loads.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String, // e.g., "smtp.gmail.com"
    pub port: u16,    // implicit TLS, e.g., 465
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Assets scanned each run, in display order.
    pub tickers: Vec<String>,
    /// Reference asset for alerts, correlation and the spectral analysis.
    pub benchmark: String,
    pub correlation_peers: Vec<String>,
    pub correlation_window: usize,
    /// File stems under the storage directory (".json" is appended).
    pub scan_output: String,
    pub advanced_output: String,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub smtp: SmtpConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let tickers = [
            "BTC-USD", "ETH-USD", "SOL-USD", "BNB-USD", "XRP-USD", "ADA-USD", "DOGE-USD",
            "LINK-USD", "DOT-USD", "AVAX-USD", "SHIB-USD", "MATIC-USD",
        ];
        Self {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            benchmark: "BTC-USD".to_string(),
            correlation_peers: vec!["ETH-USD".to_string(), "SOL-USD".to_string()],
            correlation_window: 30,
            scan_output: "market_scan".to_string(),
            advanced_output: "advanced_analysis".to_string(),
            request_timeout_secs: 30,
            max_concurrent_requests: 4,
            smtp: SmtpConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Uses `base_dir` as-is, creating it if needed.
    pub async fn new<P: AsRef<Path>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Storage directory next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// Serializes `data` to `<filename>.json`.
    /// Writes a sibling .tmp file and renames it over the target, so readers
    /// see either the old file or the new one, never a partial write.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates UTF-8 itself, so read raw bytes
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Like `load`, but a missing file is `Ok(None)` ("nothing written yet")
    /// while an unreadable or corrupt file is still an error.
    pub async fn load_optional<T: DeserializeOwned>(
        &self,
        filename: &str,
    ) -> anyhow::Result<Option<T>> {
        match fs::read(self.path_for(filename)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the engine config, falling back to defaults when absent.
    pub async fn load_config(&self, filename: &str) -> anyhow::Result<EngineConfig> {
        Ok(self.load_optional(filename).await?.unwrap_or_default())
    }
}
