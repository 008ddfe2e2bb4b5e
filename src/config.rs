use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default base address of the detection service
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,
    /// Base address of the detection service
    pub server_url: String,
    /// MJPEG feed URL; derived from server_url when unset
    pub video_feed_url: Option<String>,
    /// Request timeout for feed and detection calls
    pub timeout_secs: u64,
    /// Skip spoken feedback
    pub mute: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            server_url: DEFAULT_SERVER_URL.to_string(),
            video_feed_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            mute: false,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotioncli"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// The MJPEG feed URL, explicit or derived from the server address
    pub fn feed_url(&self) -> String {
        match &self.video_feed_url {
            Some(url) => url.clone(),
            None => format!("{}/video_feed", self.server_url.trim_end_matches('/')),
        }
    }
}
