//! Configuration and settings management
//!
//! Loads settings from environment variables and optional config files.
//! Everything is read once at process start; nothing here is mutable at
//! runtime.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of operator user IDs
    #[serde(rename = "admin_ids")]
    pub admin_ids_str: Option<String>,

    /// Shares required before gated content unlocks
    #[serde(default = "default_goal")]
    pub goal: u32,

    /// Link handed out by the share button; `{id}` is replaced with the
    /// sharing user's id so referrals can be attributed
    pub share_url: Option<String>,
    /// Exclusive channel link shown once the gate is unlocked
    pub channel_url: Option<String>,
    /// Optional media attached to the UI card (photo, `.mp4` or `.gif` URL)
    pub ui_media_url: Option<String>,

    /// Upstash Redis REST endpoint
    pub upstash_redis_rest_url: Option<String>,
    /// Upstash Redis REST token
    pub upstash_redis_rest_token: Option<String>,

    /// Fixed delay between broadcast sends, in milliseconds
    #[serde(default = "default_broadcast_delay_ms")]
    pub broadcast_delay_ms: u64,

    /// Safety cap on the subscriber snapshot handed to a fan-out
    #[serde(default = "default_fanout_limit")]
    pub fanout_limit: usize,

    /// Maximum number of entries in the in-process locale cache
    #[serde(default = "default_locale_cache_size")]
    pub locale_cache_size: u64,

    /// Address the webhook server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

const fn default_goal() -> u32 {
    6
}

const fn default_broadcast_delay_ms() -> u64 {
    100
}

const fn default_fanout_limit() -> usize {
    10_000
}

const fn default_locale_cache_size() -> u64 {
    10_000
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: Check environment variables directly if config didn't pick them up
        // This handles cases where automatic mapping might fail or behavior differs
        if settings.upstash_redis_rest_url.is_none() {
            if let Ok(val) = std::env::var("UPSTASH_REDIS_REST_URL") {
                if !val.is_empty() {
                    settings.upstash_redis_rest_url = Some(val);
                }
            }
        }
        if settings.upstash_redis_rest_token.is_none() {
            if let Ok(val) = std::env::var("UPSTASH_REDIS_REST_TOKEN") {
                if !val.is_empty() {
                    settings.upstash_redis_rest_token = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Returns the set of Telegram IDs allowed to use operator commands
    #[must_use]
    pub fn admin_ids(&self) -> HashSet<i64> {
        self.admin_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            goal: default_goal(),
            share_url: None,
            channel_url: None,
            ui_media_url: None,
            upstash_redis_rest_url: None,
            upstash_redis_rest_token: None,
            broadcast_delay_ms: default_broadcast_delay_ms(),
            fanout_limit: default_fanout_limit(),
            locale_cache_size: default_locale_cache_size(),
            listen_addr: default_listen_addr(),
        }
    }

    #[test]
    fn test_admin_list_parsing() {
        let mut settings = base_settings();

        // Test comma
        settings.admin_ids_str = Some("123,456".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&123));
        assert!(admins.contains(&456));
        assert_eq!(admins.len(), 2);

        // Test space
        settings.admin_ids_str = Some("111 222".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&111));
        assert!(admins.contains(&222));
        assert_eq!(admins.len(), 2);

        // Test semicolon and mixed
        settings.admin_ids_str = Some("333; 444, 555".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&333));
        assert!(admins.contains(&444));
        assert!(admins.contains(&555));
        assert_eq!(admins.len(), 3);

        // Test empty/bad parsing
        settings.admin_ids_str = Some("abc, 777".to_string());
        let admins = settings.admin_ids();
        assert!(admins.contains(&777));
        assert_eq!(admins.len(), 1);
    }

    #[test]
    fn test_defaults() {
        let settings = base_settings();
        assert_eq!(settings.goal, 6);
        assert_eq!(settings.broadcast_delay_ms, 100);
        assert_eq!(settings.fanout_limit, 10_000);
        assert!(settings.admin_ids().is_empty());
    }
}
