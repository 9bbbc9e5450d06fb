use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cache::{CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_RETENTION_DAYS};
use crate::models::ProviderId;
use crate::providers::{bing, google, youdao};
use crate::settings::{provider_key, SettingsStore, API_KEY, APP_SECRET};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub cache_dir: PathBuf,
    pub settings_file: PathBuf,

    // Cache
    pub cache_max_entries: usize,
    pub cache_retention_days: i64,

    // Provider endpoints
    pub youdao_api_url: String,
    pub bing_api_url: String,
    pub google_api_url: String,

    // Networking
    pub youdao_batch_delay_ms: u64,
    pub http_timeout_secs: u64,

    // Credentials, seeded into settings at start-up
    pub youdao_app_key: Option<String>,
    pub youdao_app_secret: Option<String>,
    pub bing_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cache_dir = match std::env::var("POLYSAVER_CACHE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::cache_dir()
                .map(|dir| dir.join("polysaver"))
                .context("POLYSAVER_CACHE_DIR not set and no platform cache directory")?,
        };

        let mut config = Self::for_cache_dir(cache_dir);

        if let Ok(file) = std::env::var("POLYSAVER_SETTINGS_FILE") {
            config.settings_file = PathBuf::from(file);
        }

        // Cache
        config.cache_max_entries = parsed_var("CACHE_MAX_ENTRIES")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        config.cache_retention_days = parsed_var("CACHE_RETENTION_DAYS")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        // Endpoints
        if let Ok(url) = std::env::var("YOUDAO_API_URL") {
            config.youdao_api_url = url;
        }
        if let Ok(url) = std::env::var("BING_API_URL") {
            config.bing_api_url = url;
        }
        if let Ok(url) = std::env::var("GOOGLE_API_URL") {
            config.google_api_url = url;
        }

        // Networking
        config.youdao_batch_delay_ms = parsed_var("YOUDAO_BATCH_DELAY_MS").unwrap_or(100);
        config.http_timeout_secs = parsed_var("HTTP_TIMEOUT_SECS").unwrap_or(10);

        // Credentials
        config.youdao_app_key = optional_var("YOUDAO_APP_KEY");
        config.youdao_app_secret = optional_var("YOUDAO_APP_SECRET");
        config.bing_api_key = optional_var("BING_API_KEY");
        config.google_api_key = optional_var("GOOGLE_API_KEY");

        Ok(config)
    }

    /// Defaults rooted at `cache_dir`, no credentials
    pub fn for_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            settings_file: cache_dir.join("settings.json"),
            cache_dir,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_retention_days: DEFAULT_RETENTION_DAYS,
            youdao_api_url: youdao::DEFAULT_ENDPOINT.to_string(),
            bing_api_url: bing::DEFAULT_ENDPOINT.to_string(),
            google_api_url: google::DEFAULT_ENDPOINT.to_string(),
            youdao_batch_delay_ms: 100,
            http_timeout_secs: 10,
            youdao_app_key: None,
            youdao_app_secret: None,
            bing_api_key: None,
            google_api_key: None,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
            retention_days: self.cache_retention_days,
        }
    }

    /// Write any credentials from the environment into the settings store
    ///
    /// Values already in the store are overwritten; unset variables leave them alone.
    pub fn seed_credentials(&self, settings: &dyn SettingsStore) {
        let seeds = [
            (ProviderId::Youdao, API_KEY, &self.youdao_app_key),
            (ProviderId::Youdao, APP_SECRET, &self.youdao_app_secret),
            (ProviderId::Bing, API_KEY, &self.bing_api_key),
            (ProviderId::Google, API_KEY, &self.google_api_key),
        ];

        for (provider, field, value) in seeds {
            if let Some(value) = value {
                settings.set_string(&provider_key(provider, field), value);
                info!("Loaded {} {} from environment", provider.display_name(), field);
            }
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
