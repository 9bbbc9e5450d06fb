//! Persisted key-value settings.
//!
//! Providers and the dispatcher read credentials, usage counters and the
//! preferred provider through [`SettingsStore`], so tests can swap the
//! on-disk store for [`MemorySettings`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::models::ProviderId;

pub const PREFERRED_PROVIDER: &str = "preferred_provider";

/// Settings key scoped to one provider, e.g. `youdao.usage_count`
pub fn provider_key(provider: ProviderId, field: &str) -> String {
    format!("{}.{}", provider.as_str(), field)
}

pub const API_KEY: &str = "api_key";
pub const APP_SECRET: &str = "app_secret";
pub const USAGE_COUNT: &str = "usage_count";
pub const LAST_RESET: &str = "last_reset";

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn remove(&self, key: &str);

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, Value::String(value.to_string()));
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    fn set_u32(&self, key: &str, value: u32) {
        self.set(key, Value::from(value));
    }

    /// Timestamps are stored as RFC 3339 strings
    fn get_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_string(key)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn set_timestamp(&self, key: &str, value: DateTime<Utc>) {
        self.set_string(key, &value.to_rfc3339());
    }
}

/// Volatile store, used in tests and when no settings file is configured
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// JSON object on disk, rewritten in full after every change
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FileSettings {
    /// Open the settings file, starting empty if it is missing or unreadable
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let values = match load_values(&path) {
            Ok(Some(values)) => values,
            Ok(None) => {
                info!("No settings file at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Map::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let content =
            serde_json::to_string_pretty(values).context("Failed to serialize settings")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings file {}", self.path.display()))
    }

    fn update(&self, apply: impl FnOnce(&mut Map<String, Value>)) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        apply(&mut values);
        if let Err(e) = self.persist(&values) {
            warn!("Settings kept in memory only: {:#}", e);
        }
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.update(|values| {
            values.insert(key.to_string(), value);
        });
    }

    fn remove(&self, key: &str) {
        self.update(|values| {
            values.remove(key);
        });
    }
}

fn load_values(path: &Path) -> Result<Option<Map<String, Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let values = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
    Ok(Some(values))
}
