// src/cache/mod.rs
//
// Local TVL cache with staleness tracking.
// Keeps the latest history per protocol in memory, persists it to a JSONL file,
// and refreshes from the configured source when the data gets old.

use crate::models::{Protocol, TvlHistory};
use crate::traits::{Refreshable, SharedTvlSource};
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default stale threshold for TVL data (DefiLlama publishes daily points).
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

pub const DEFAULT_CACHE_PATH: &str = "cache/tvl_history.jsonl";

// =============================================================================
// File Format
// =============================================================================

/// Entry types for the JSONL cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheFileEntry {
    /// The current/latest state snapshot.
    Current {
        timestamp: u64,
        /// Protocols the refresh fetched, including those with no data.
        #[serde(default)]
        protocols: Vec<Protocol>,
        items: Vec<TvlHistory>,
    },
}

// =============================================================================
// Cache State
// =============================================================================

#[derive(Default)]
struct CacheState {
    /// Histories keyed by slug.
    histories: HashMap<String, TvlHistory>,
    /// Unix timestamp of last refresh.
    last_updated: u64,
    /// Protocol set the last refresh covered.
    fetched: Vec<Protocol>,
}

/// TVL history cache shared between the report builder and the dashboard.
pub struct TvlCache {
    inner: RwLock<CacheState>,
    cache_path: Option<PathBuf>,
    source: SharedTvlSource,
    protocols: Vec<Protocol>,
    stale_threshold_secs: u64,
    refresh_in_progress: AtomicBool,
}

impl TvlCache {
    /// Creates a cache, loading any previously saved state from `cache_path`.
    ///
    /// Passing `None` keeps the cache in memory only.
    pub fn new(
        source: SharedTvlSource,
        protocols: Vec<Protocol>,
        cache_path: Option<&Path>,
        stale_threshold_secs: u64,
    ) -> Arc<Self> {
        let state = cache_path
            .and_then(|p| load_from_disk(p, &protocols))
            .unwrap_or_default();

        if !state.histories.is_empty() {
            info!(
                "TvlCache: Loaded {} histories from cache (updated {})",
                state.histories.len(),
                format_timestamp(state.last_updated)
            );
        }

        Arc::new(Self {
            inner: RwLock::new(state),
            cache_path: cache_path.map(Path::to_path_buf),
            source,
            protocols,
            stale_threshold_secs,
            refresh_in_progress: AtomicBool::new(false),
        })
    }

    /// Creates an empty in-memory cache.
    pub fn in_memory(source: SharedTvlSource, protocols: Vec<Protocol>) -> Arc<Self> {
        Self::new(source, protocols, None, DEFAULT_STALE_THRESHOLD_SECS)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The protocols this cache tracks, in configured order.
    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Check if the cached data is stale.
    pub fn is_stale(&self) -> bool {
        is_stale(self.read_state().last_updated, self.stale_threshold_secs)
    }

    pub fn len(&self) -> usize {
        self.read_state().histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().histories.is_empty()
    }

    /// All cached histories, in configured protocol order.
    pub fn histories(&self) -> Vec<TvlHistory> {
        let state = self.read_state();
        self.protocols
            .iter()
            .filter_map(|p| state.histories.get(&p.slug).cloned())
            .collect()
    }

    /// History for one protocol by slug.
    pub fn history(&self, slug: &str) -> Option<TvlHistory> {
        self.read_state().histories.get(slug).cloned()
    }

    /// True when the configured protocols (slugs or names) differ from the set
    /// the cached data was fetched for.
    pub fn protocols_changed(&self) -> bool {
        let state = self.read_state();
        self.protocols.len() != state.fetched.len()
            || self.protocols.iter().any(|p| !state.fetched.contains(p))
    }

    /// Refreshes only when the cache is empty, stale, or was fetched for a
    /// different protocol set.
    pub async fn ensure_fresh(&self) -> Result<usize, String> {
        if self.is_empty() || self.is_stale() || self.protocols_changed() {
            self.refresh_internal().await
        } else {
            info!(
                "TvlCache: Cache is fresh (updated {}), skipping refresh",
                format_timestamp(self.last_updated())
            );
            Ok(0)
        }
    }

    async fn refresh_internal(&self) -> Result<usize, String> {
        if self
            .refresh_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("TvlCache: Refresh already in progress");
            return Ok(0);
        }
        let _guard = RefreshGuard::new(&self.refresh_in_progress);

        info!(
            "TvlCache: Fetching {} protocols from {}",
            self.protocols.len(),
            self.source.name()
        );

        let results = join_all(
            self.protocols
                .iter()
                .map(|p| async move { (p, self.source.fetch_history(p).await) }),
        )
        .await;

        let mut fetched: HashMap<String, Option<TvlHistory>> = HashMap::new();
        let mut failures = Vec::new();
        for (protocol, result) in results {
            match result {
                Ok(history) => {
                    if history.is_none() {
                        warn!("TvlCache: No TVL history available for {}", protocol);
                    }
                    fetched.insert(protocol.slug.clone(), history);
                }
                Err(e) => {
                    warn!("TvlCache: Failed to fetch {}: {}", protocol, e);
                    failures.push(format!("{}: {}", protocol.slug, e));
                }
            }
        }

        if fetched.is_empty() && !failures.is_empty() {
            return Err(format!("All fetches failed ({})", failures.join("; ")));
        }

        let now = now_secs();
        let changed = {
            let mut state = self.write_state();
            let mut changed = 0;
            for (slug, history) in fetched {
                match history {
                    Some(history) => {
                        if state.histories.get(&slug) != Some(&history) {
                            changed += 1;
                        }
                        state.histories.insert(slug, history);
                    }
                    None => {
                        if state.histories.remove(&slug).is_some() {
                            changed += 1;
                        }
                    }
                }
            }
            state.last_updated = now;
            state.fetched = self.protocols.clone();
            changed
        };

        if let Some(path) = &self.cache_path {
            if let Err(e) = self.save_to_disk(path) {
                error!("TvlCache: Failed to save cache: {}", e);
            } else {
                info!("TvlCache: Saved {} histories to {}", self.len(), path.display());
            }
        }

        info!(
            "TvlCache: Refresh complete, {} changed, {} failed",
            changed,
            failures.len()
        );
        Ok(changed)
    }

    fn save_to_disk(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create cache directory: {}", e))?;
            }
        }

        let entry = {
            let state = self.read_state();
            CacheFileEntry::Current {
                timestamp: state.last_updated,
                protocols: state.fetched.clone(),
                items: self
                    .protocols
                    .iter()
                    .filter_map(|p| state.histories.get(&p.slug).cloned())
                    .collect(),
            }
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| format!("Failed to serialize cache: {}", e))?;

        let mut file =
            File::create(path).map_err(|e| format!("Failed to create cache file: {}", e))?;
        writeln!(file, "{}", line).map_err(|e| format!("Failed to write current state: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl Refreshable for TvlCache {
    async fn refresh(&self) -> Result<usize, String> {
        self.refresh_internal().await
    }

    fn last_updated(&self) -> u64 {
        self.read_state().last_updated
    }
}

// =============================================================================
// Disk Loading
// =============================================================================

/// Loads cache state from a JSONL file, keeping only tracked protocols.
fn load_from_disk(path: &Path, protocols: &[Protocol]) -> Option<CacheState> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);

    let first_line = reader.lines().next()?.ok()?;
    let entry: CacheFileEntry = match serde_json::from_str(&first_line) {
        Ok(e) => e,
        Err(e) => {
            warn!("TvlCache: Ignoring unreadable cache {}: {}", path.display(), e);
            return None;
        }
    };

    let CacheFileEntry::Current {
        timestamp,
        protocols: fetched,
        items,
    } = entry;
    let histories = items
        .into_iter()
        .filter(|h| protocols.iter().any(|p| p.slug == h.protocol.slug))
        .map(|h| (h.protocol.slug.clone(), h))
        .collect();

    Some(CacheState {
        histories,
        last_updated: timestamp,
        fetched,
    })
}

// =============================================================================
// Refresh Guard
// =============================================================================

/// RAII guard that resets an `AtomicBool` flag to `false` on drop.
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        Self { flag }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Check if a timestamp is stale relative to a threshold.
///
/// Saturates when `last_updated > now` (clock skew, hand-edited cache), which
/// counts as fresh.
pub fn is_stale(last_updated: u64, threshold_secs: u64) -> bool {
    now_secs().saturating_sub(last_updated) > threshold_secs
}

/// Format a Unix timestamp for logging.
pub fn format_timestamp(ts: u64) -> String {
    if ts == 0 {
        return "never".to_string();
    }
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("unix:{}", ts))
}

// =============================================================================
// Tests
// =============================================================================
