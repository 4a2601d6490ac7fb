// src/traits.rs

use crate::models::{Protocol, TvlHistory};
use async_trait::async_trait;
use std::sync::Arc;

/// A source of protocol TVL histories.
///
/// `Ok(None)` means the source answered but has no usable history for the
/// protocol (unknown slug, empty series). `Err` is reserved for transport or
/// read failures, which callers may retry or fall back from.
#[async_trait]
pub trait TvlSource: Send + Sync {
    /// Returns the name of this source (for logging).
    fn name(&self) -> &str;

    /// Fetches the full daily TVL history for a protocol.
    async fn fetch_history(&self, protocol: &Protocol) -> Result<Option<TvlHistory>, String>;
}

/// Shared source for use across the cache and background tasks.
pub type SharedTvlSource = Arc<dyn TvlSource>;

/// Minimal trait for refreshing cached data from its source.
///
/// Uses `&self` with interior mutability so implementations can be shared
/// via `Arc<dyn Refreshable>`.
#[async_trait]
pub trait Refreshable: Send + Sync {
    /// Refresh from the source.
    ///
    /// Returns the number of entries that changed.
    async fn refresh(&self) -> Result<usize, String>;

    /// Returns the Unix timestamp of the last refresh.
    fn last_updated(&self) -> u64;
}

pub type SharedRefreshable = Arc<dyn Refreshable>;
