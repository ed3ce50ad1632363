use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// YouTube Data API key used for every remote call
    pub api_key: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_videos: Option<usize>,
    /// Override for the Data API base URL
    pub api_base_url: Option<String>,
}

impl Config {
    /// Load config from ~/.config/ytscrape/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytscrape")
        .join("config.toml")
}
