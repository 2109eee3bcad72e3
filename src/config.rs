use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::transcript::ExtractOptions;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Caption languages in preference order
    pub languages: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub ytdlp_bin: Option<String>,
    pub ytdlp_args: Option<Vec<String>>,
    pub scratch_dir: Option<PathBuf>,
    pub default_format: Option<String>,
    pub default_model: Option<String>,
}

impl Config {
    /// Load config from ~/.config/ytchat/config.toml if it exists
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

    /// Extraction settings from this file, falling back to the built-in defaults
    pub fn extract_options(&self) -> ExtractOptions {
        let defaults = ExtractOptions::default();
        ExtractOptions {
            ytdlp_bin: self
                .ytdlp_bin
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_bin),
            ytdlp_args: self.ytdlp_args.clone().unwrap_or(defaults.ytdlp_args),
            languages: self
                .languages
                .clone()
                .filter(|langs| !langs.is_empty())
                .unwrap_or(defaults.languages),
            timeout: self
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            scratch_root: self.scratch_dir.clone().or(defaults.scratch_root),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytchat")
        .join("config.toml")
}
