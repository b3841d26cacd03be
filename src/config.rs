//! TagIt configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main TagIt configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagItConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Channel configurations
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("tagit.db"),
        }
    }
}

/// Channel configurations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Telegram channel config
    pub telegram: Option<TelegramConfig>,
}

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token
    pub bot_token_ref: String,

    /// Allowed user IDs (empty = all allowed)
    #[serde(default)]
    pub allowed_users: Vec<i64>,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_ref: "TAGIT_BOT_TOKEN".to_string(),
            allowed_users: Vec::new(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TagItConfig::default();
        assert_eq!(config.storage.db_path, PathBuf::from("tagit.db"));
        assert!(config.channels.telegram.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = TagItConfig {
            channels: ChannelsConfig {
                telegram: Some(TelegramConfig {
                    bot_token_ref: "MY_TOKEN".to_string(),
                    allowed_users: vec![42],
                    poll_timeout_secs: 10,
                }),
            },
            ..Default::default()
        };
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: TagItConfig = toml::from_str(&toml).unwrap();
        let telegram = parsed.channels.telegram.unwrap();
        assert_eq!(telegram.bot_token_ref, "MY_TOKEN");
        assert_eq!(telegram.allowed_users, vec![42]);
        assert_eq!(telegram.poll_timeout_secs, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: TagItConfig = toml::from_str(
            r#"
            [channels.telegram]
            bot_token_ref = "TOKEN"
            "#,
        )
        .unwrap();
        let telegram = parsed.channels.telegram.unwrap();
        assert!(telegram.allowed_users.is_empty());
        assert_eq!(telegram.poll_timeout_secs, 30);
        assert_eq!(parsed.storage.db_path, PathBuf::from("tagit.db"));
    }
}
