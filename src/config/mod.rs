use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractors::StrategyKind;

/// Helper process runs are capped at 30 seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Helper process stdout is capped at 10 MiB
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Strategy ordering
    pub strategies: StrategiesConfig,

    /// Helper process settings
    pub subprocess: SubprocessConfig,

    /// In-process scraping settings
    pub scrape: ScrapeConfig,

    /// YouTube Data API settings
    pub official_api: OfficialApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesConfig {
    /// Order tried when the caller does not pick strategies explicitly
    pub order: Vec<StrategyKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubprocessConfig {
    /// Interpreter used to run the helper script
    pub interpreter: String,

    /// Path to the helper script
    pub script: PathBuf,

    /// Wall-clock limit for one helper run
    pub timeout_secs: u64,

    /// Maximum accepted size of the helper's stdout
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Preferred caption languages, most preferred first
    pub languages: Vec<String>,

    /// Use the first available track when none matches `languages`
    pub fallback_to_any_language: bool,

    /// User agent sent with page requests
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialApiConfig {
    /// API key (overridden by --api-key / YOUTUBE_API_KEY)
    pub api_key: Option<String>,

    /// Preferred caption languages, most preferred first
    pub languages: Vec<String>,

    /// Data API base URL
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategies: StrategiesConfig {
                order: StrategyKind::default_order(),
            },
            subprocess: SubprocessConfig {
                interpreter: "python3".to_string(),
                script: PathBuf::from("scripts/fetch_transcript.py"),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            },
            scrape: ScrapeConfig {
                languages: vec!["en".to_string()],
                fallback_to_any_language: true,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            },
            official_api: OfficialApiConfig {
                api_key: None,
                languages: vec!["en".to_string()],
                base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            },
        }
    }
}

impl SubprocessConfig {
    /// Locate the helper script.
    ///
    /// A relative path that does not exist under the working directory is looked
    /// up in the config directory, then next to the executable and its two parent
    /// directories (which covers `target/<profile>/transcript` in a checkout).
    pub fn resolved_script(&self) -> PathBuf {
        resolve_script(&self.script, &script_search_dirs())
    }
}

fn script_search_dirs() -> Vec<PathBuf> {
    let mut search_dirs = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        search_dirs.push(config_dir.join("transcript-pipeline"));
    }
    if let Ok(exe) = std::env::current_exe() {
        search_dirs.extend(exe.ancestors().skip(1).take(3).map(Path::to_path_buf));
    }
    search_dirs
}

fn resolve_script(script: &Path, search_dirs: &[PathBuf]) -> PathBuf {
    if script.is_absolute() || script.is_file() {
        return script.to_path_buf();
    }

    search_dirs
        .iter()
        .map(|dir| dir.join(script))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| script.to_path_buf())
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-pipeline").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.strategies.order.is_empty() {
            anyhow::bail!("strategies.order must name at least one strategy");
        }

        if self.subprocess.timeout_secs == 0 {
            anyhow::bail!("subprocess.timeout_secs must be greater than zero");
        }

        if self.subprocess.max_output_bytes == 0 {
            anyhow::bail!("subprocess.max_output_bytes must be greater than zero");
        }

        url::Url::parse(&self.official_api.base_url)
            .context("official_api.base_url is not a valid URL")?;

        Ok(())
    }

    /// API key from the command line / environment, falling back to the config file
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Option<String> {
        override_key
            .or(self.official_api.api_key.as_deref())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        let order = self
            .strategies
            .order
            .iter()
            .map(StrategyKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!("  Strategy Order: {}", order);
        println!("  Helper: {} {}", self.subprocess.interpreter, self.subprocess.script.display());
        println!("  Helper Timeout: {}s", self.subprocess.timeout_secs);
        println!("  Helper Output Cap: {} bytes", self.subprocess.max_output_bytes);
        println!("  Scrape Languages: {}", self.scrape.languages.join(", "));
        println!("  API Key: {}", if self.official_api.api_key.is_some() { "set" } else { "not set" });
    }
}
