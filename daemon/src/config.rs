use crate::adapter::AdapterSettings;
use crate::adapter::dimensions::DimensionSettings;
use crate::engine::FeedSettings;
use crate::validate_enum;
use anyhow::{Context, Result};
use common::{EnhancementInfo, PlayerConfig, VodStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub dimensions: DimensionSection,

    #[serde(default)]
    pub subtitles: SubtitleSection,

    /// Default strategy applied to every new controller
    #[serde(default)]
    pub strategy: Option<VodStrategy>,

    /// Credentials for the optional enhancement plugin
    #[serde(default)]
    pub enhancement: Option<EnhancementInfo>,

    #[serde(default)]
    pub headless: HeadlessSection,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Feed orchestration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedSection {
    #[serde(default = "default_pre_bind_distance")]
    pub pre_bind_distance: usize,

    #[serde(default = "default_true")]
    pub default_loop: bool,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            pre_bind_distance: default_pre_bind_distance(),
            default_loop: true,
        }
    }
}

fn default_pre_bind_distance() -> usize {
    2
}
fn default_true() -> bool {
    true
}

/// Video dimension polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DimensionSection {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DimensionSection {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubtitleSection {
    #[serde(default)]
    pub auto_select_first: bool,
}

/// Dimensions reported by the headless engine for sources without any
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadlessSection {
    #[serde(default = "default_width")]
    pub default_width: u32,

    #[serde(default = "default_height")]
    pub default_height: u32,
}

impl Default for HeadlessSection {
    fn default() -> Self {
        Self {
            default_width: default_width(),
            default_height: default_height(),
        }
    }
}

fn default_width() -> u32 {
    720
}
fn default_height() -> u32 {
    1280
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("shortfeed");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        if self.dimensions.retry_delay_ms == 0 {
            anyhow::bail!("dimensions.retry_delay_ms must be greater than 0");
        }

        if self.headless.default_width == 0 || self.headless.default_height == 0 {
            anyhow::bail!(
                "Invalid headless size: {}x{}",
                self.headless.default_width,
                self.headless.default_height
            );
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }

    /// Orchestration settings for the engine
    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            pre_bind_distance: self.feed.pre_bind_distance,
            default_loop: self.feed.default_loop,
            adapter: AdapterSettings {
                dimensions: DimensionSettings {
                    retry_delay: Duration::from_millis(self.dimensions.retry_delay_ms),
                    max_retries: self.dimensions.max_retries,
                },
                auto_select_first_subtitle: self.subtitles.auto_select_first,
            },
            default_strategy: self.strategy.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.feed.pre_bind_distance, 2);
        assert!(config.feed.default_loop);
        assert_eq!(config.dimensions.retry_delay_ms, 100);
        assert_eq!(config.dimensions.max_retries, 10);
        assert!(!config.subtitles.auto_select_first);
        assert!(config.player.enable_log);
        assert!(config.enhancement.is_none());
    }

    #[test]
    fn test_validate_log_level() {
        let config = Config::default();
        assert!(config.validate_log_level("debug").is_ok());
        assert!(config.validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_feed_settings() {
        let toml = r#"
[feed]
pre_bind_distance = 3
default_loop = false

[dimensions]
retry_delay_ms = 50
max_retries = 4

[subtitles]
auto_select_first = true
"#;

        let config: Config = toml::from_str(toml).unwrap();
        let settings = config.feed_settings();
        assert_eq!(settings.pre_bind_distance, 3);
        assert!(!settings.default_loop);
        assert_eq!(settings.adapter.dimensions.retry_delay, Duration::from_millis(50));
        assert_eq!(settings.adapter.dimensions.max_retries, 4);
        assert!(settings.adapter.auto_select_first_subtitle);
    }

    #[test]
    fn test_config_with_player_and_strategy() {
        let toml = r#"
[general]
log_level = "debug"

[player]
license_url = "https://license.example/v1"
license_key = "secret"

[strategy]
preloadCount = 2
maxBufferSize = "not a number"

[enhancement]
app_id = 1500
auth_id = 7
sr_algorithm = 1
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(config.player.enable_log);
        assert_eq!(config.player.license_key, "secret");

        let strategy = config.strategy.unwrap();
        assert_eq!(strategy.preload_count, Some(2));
        assert_eq!(strategy.max_buffer_size, None);

        let info = config.enhancement.unwrap();
        assert_eq!(info.app_id, 1500);
        assert_eq!(info.auth_id, 7);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[headless]\ndefault_width = 1080\ndefault_height = 1920").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.headless.default_width, 1080);
        assert_eq!(config.headless.default_height, 1920);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_level = \"loud\"").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());

        let missing = file.path().with_extension("missing");
        assert!(Config::load_from_path(&missing).is_ok());
    }
}
