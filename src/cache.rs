//! Expiring word cache with strict LRU eviction and a JSON snapshot on disk.
//!
//! The in-memory map is authoritative. Every mutation that changes the
//! persisted set schedules a whole-file snapshot write on a background task;
//! failures there are logged and never reach the caller.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use lru::LruCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::models::Word;

pub const SNAPSHOT_FILE_NAME: &str = "words_cache.json";
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub word: Word,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    /// Expired once the whole days elapsed since creation reach the retention window
    pub fn is_expired(&self, now: DateTime<Utc>, retention_days: i64) -> bool {
        (now - self.timestamp).num_days() >= retention_days
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub retention_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub disk_size_bytes: u64,
}

/// Unbounded map in recency order; capacity is enforced by `evict_to` so a batch evicts once
type CacheState = LruCache<String, CacheEntry>;

fn evict_to(state: &mut CacheState, max_entries: usize) {
    while state.len() > max_entries {
        let Some((lru_key, _)) = state.pop_lru() else {
            break;
        };
        debug!("LRU evicted: {}", lru_key);
    }
}

/// Plain map of the current entries, the on-disk snapshot format
fn snapshot_of(state: &CacheState) -> HashMap<String, CacheEntry> {
    state
        .iter()
        .map(|(key, entry)| (key.clone(), entry.clone()))
        .collect()
}

/// Snapshot writer shared with background tasks
#[derive(Debug)]
struct SnapshotWriter {
    path: PathBuf,
    /// Bumped on every mutation; a snapshot only lands if it is still the latest
    generation: AtomicU64,
    file_lock: Mutex<()>,
}

impl SnapshotWriter {
    fn write(&self, generation: u64, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Skipping stale cache snapshot (generation {})", generation);
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }

        let content = serde_json::to_vec(entries).context("Failed to serialize cache snapshot")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", self.path.display())),
        }
    }
}

pub struct WordCache {
    state: Mutex<CacheState>,
    writer: Arc<SnapshotWriter>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl WordCache {
    /// Open the cache backed by `<cache_dir>/words_cache.json`
    pub fn open(cache_dir: impl AsRef<Path>, config: CacheConfig) -> Self {
        Self::with_clock(
            cache_dir.as_ref().join(SNAPSHOT_FILE_NAME),
            config,
            Arc::new(SystemClock),
        )
    }

    /// Open with an explicit snapshot path and time source
    pub fn with_clock(snapshot_path: PathBuf, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut state: CacheState = LruCache::unbounded();

        match load_snapshot(&snapshot_path) {
            Ok(Some(snapshot)) => {
                let now = clock.now();
                let total = snapshot.len();
                for (key, entry) in snapshot {
                    if entry.is_expired(now, config.retention_days) {
                        continue;
                    }
                    state.put(key, entry);
                }
                let expired = total - state.len();
                evict_to(&mut state, config.max_entries);
                info!(
                    "Loaded {} cached words from disk ({} expired dropped)",
                    state.len(),
                    expired
                );
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load word cache: {:#}", e),
        }

        Self {
            state: Mutex::new(state),
            writer: Arc::new(SnapshotWriter {
                path: snapshot_path,
                generation: AtomicU64::new(0),
                file_lock: Mutex::new(()),
            }),
            config,
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.writer.path
    }

    /// Look up a word case-insensitively; expired entries are dropped on sight
    pub fn get(&self, head_word: &str) -> Option<Word> {
        let key = head_word.to_lowercase();
        let now = self.clock.now();
        let mut state = self.lock();

        let expired = state
            .peek(&key)
            .map(|entry| entry.is_expired(now, self.config.retention_days))?;

        if expired {
            state.pop(&key);
            debug!("Cache entry expired: {}", key);
            return None;
        }

        state.get(&key).map(|entry| entry.word.clone())
    }

    pub fn put(&self, word: Word) {
        self.put_batch(std::iter::once(word));
    }

    /// Insert every word, evict once, and schedule a single snapshot write
    pub fn put_batch(&self, words: impl IntoIterator<Item = Word>) {
        let now = self.clock.now();
        let mut state = self.lock();

        for word in words {
            state.put(
                word.key(),
                CacheEntry {
                    word,
                    timestamp: now,
                },
            );
        }
        evict_to(&mut state, self.config.max_entries);

        self.schedule_snapshot(&state);
    }

    /// Empty the cache and delete the snapshot file
    pub fn clear(&self) {
        let mut state = self.lock();
        state.clear();

        if let Err(e) = self.writer.delete() {
            warn!("{:#}", e);
        }
        info!("Word cache cleared");
    }

    /// Remove every expired entry; returns how many were dropped
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();

        let expired: Vec<String> = state
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.config.retention_days))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.pop(key);
        }

        if !expired.is_empty() {
            info!("Removed {} expired cache entries", expired.len());
            self.schedule_snapshot(&state);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let count = self.lock().len();
        let disk_size_bytes = std::fs::metadata(&self.writer.path)
            .map(|m| m.len())
            .unwrap_or(0);
        CacheStats {
            count,
            disk_size_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the snapshot synchronously, bypassing the background task
    pub fn save_snapshot(&self) -> Result<()> {
        let state = self.lock();
        let generation = self.writer.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.writer.write(generation, &snapshot_of(&state))
    }

    /// Caller must hold the state lock so generations follow mutation order
    fn schedule_snapshot(&self, state: &CacheState) {
        let generation = self.writer.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let entries = snapshot_of(state);
        let writer = Arc::clone(&self.writer);

        let write = move || {
            if let Err(e) = writer.write(generation, &entries) {
                warn!("Failed to save word cache: {:#}", e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }

    /// Keys from least to most recently used
    #[cfg(test)]
    fn access_order(&self) -> Vec<String> {
        self.lock().iter().rev().map(|(key, _)| key.clone()).collect()
    }

    #[cfg(test)]
    fn keys(&self) -> std::collections::HashSet<String> {
        self.lock().iter().map(|(key, _)| key.clone()).collect()
    }
}

fn load_snapshot(path: &Path) -> Result<Option<HashMap<String, CacheEntry>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(snapshot))
}
