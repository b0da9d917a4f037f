// src/config/mod.rs - Bot configuration loaded from YAML

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::bot::classifier::{Classifier, DEFAULT_LINK_PATTERN, DEFAULT_OFFENSIVE_WORDS};

const CONFIG_FILE: &str = "bot.yaml";

/// Top-level bot configuration (`bot.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BotConfiguration {
    pub core: CoreBotSettings,
    pub storage: StorageSettings,
    pub moderation: ModerationSettings,
    pub engagement: EngagementSettings,
    pub stickers: StickerSettings,
    pub web: WebSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreBotSettings {
    pub bot_name: String,
    pub command_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Snapshot file, relative to the working directory
    pub data_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// Blocklist used until one is saved from the control surface
    pub default_offensive_words: Vec<String>,
    pub link_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementSettings {
    pub ranking_limit: usize,
    pub lurker_threshold: u64,
    pub lurker_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerSettings {
    pub enabled: bool,
    pub trigger_word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for CoreBotSettings {
    fn default() -> Self {
        Self {
            bot_name: "GroupWarden".to_string(),
            command_prefix: "!".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("bot_data.json"),
        }
    }
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            default_offensive_words: DEFAULT_OFFENSIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
        }
    }
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            ranking_limit: 10,
            lurker_threshold: 3,
            lurker_limit: 10,
        }
    }
}

impl Default for StickerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_word: "figurinha".to_string(),
        }
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
        }
    }
}

impl BotConfiguration {
    /// Classifier built from the configured defaults
    pub fn classifier(&self) -> Result<Classifier> {
        Classifier::new(
            self.moderation.default_offensive_words.clone(),
            &self.moderation.link_pattern,
        )
    }

    /// Apply `PORT` and `BOT_DATA_FILE` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.web.port = port,
                Err(_) => warn!("Ignoring invalid PORT value '{}'", port),
            }
        }
        if let Ok(path) = env::var("BOT_DATA_FILE") {
            if !path.trim().is_empty() {
                self.storage.data_file = PathBuf::from(path);
            }
        }
    }
}

/// Checks a configuration before it replaces the active one
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &BotConfiguration) -> Result<()> {
        if config.core.command_prefix.is_empty() {
            return Err(anyhow!("core.command_prefix cannot be empty"));
        }
        if config.engagement.ranking_limit == 0 || config.engagement.lurker_limit == 0 {
            return Err(anyhow!("engagement limits must be greater than zero"));
        }
        if config.engagement.lurker_threshold == 0 {
            return Err(anyhow!("engagement.lurker_threshold must be greater than zero"));
        }
        // Surfaces an invalid link pattern
        config.classifier()?;
        Ok(())
    }
}

/// Owns the configuration directory and the cached configuration
#[derive(Clone)]
pub struct ConfigurationManager {
    config_dir: PathBuf,
    bot_config: Arc<RwLock<BotConfiguration>>,
}

impl ConfigurationManager {
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            bot_config: Arc::new(RwLock::new(BotConfiguration::default())),
        }
    }

    /// Directory from `BOT_CONFIG_DIR`, defaulting to `config`
    pub fn from_env() -> Self {
        let dir = env::var("BOT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::new(dir)
    }

    /// Load `bot.yaml`, writing a default one if it is missing or invalid
    pub async fn initialize(&self) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).await?;
            info!("Created configuration directory: {}", self.config_dir.display());
        }

        if let Err(e) = self.load_bot_config().await {
            warn!("Failed to load bot config, using defaults: {}", e);
            self.create_default_bot_config().await?;
        }

        self.bot_config.write().await.apply_env_overrides();
        info!("Configuration manager initialized successfully");
        Ok(())
    }

    async fn load_bot_config(&self) -> Result<()> {
        let config_path = self.config_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(anyhow!("Bot config file not found"));
        }

        let content = fs::read_to_string(&config_path).await?;
        let config: BotConfiguration = serde_yaml::from_str(&content)?;
        ConfigValidator::validate(&config)?;

        *self.bot_config.write().await = config;
        debug!("Loaded bot configuration from {}", config_path.display());
        Ok(())
    }

    async fn create_default_bot_config(&self) -> Result<()> {
        let config = BotConfiguration::default();
        let config_path = self.config_dir.join(CONFIG_FILE);
        let content = serde_yaml::to_string(&config)?;
        fs::write(&config_path, content).await?;

        *self.bot_config.write().await = config;
        info!("Created default bot configuration: {}", config_path.display());
        Ok(())
    }

    pub async fn get_bot_config(&self) -> BotConfiguration {
        self.bot_config.read().await.clone()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_creates_default_config() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigurationManager::new(temp_dir.path());
        manager.initialize().await.unwrap();

        assert!(temp_dir.path().join("bot.yaml").exists());
        let config = manager.get_bot_config().await;
        assert_eq!(config.core.command_prefix, "!");
        assert_eq!(config.engagement.lurker_threshold, 3);
        assert_eq!(config.moderation.default_offensive_words.len(), 12);
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("bot.yaml"),
            "engagement:\n  lurker_threshold: 5\nstickers:\n  enabled: false\n",
        )
        .unwrap();

        let manager = ConfigurationManager::new(temp_dir.path());
        manager.initialize().await.unwrap();
        let config = manager.get_bot_config().await;

        assert_eq!(config.engagement.lurker_threshold, 5);
        assert_eq!(config.engagement.ranking_limit, 10);
        assert!(!config.stickers.enabled);
        assert_eq!(config.stickers.trigger_word, "figurinha");
    }

    #[tokio::test]
    async fn test_invalid_config_replaced_by_default() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("bot.yaml"), "moderation:\n  link_pattern: \"(\"\n").unwrap();

        let manager = ConfigurationManager::new(temp_dir.path());
        manager.initialize().await.unwrap();
        assert_eq!(manager.get_bot_config().await.moderation.link_pattern, DEFAULT_LINK_PATTERN);
    }

    #[test]
    fn test_validation_rejects_empty_prefix() {
        let mut config = BotConfiguration::default();
        config.core.command_prefix.clear();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
