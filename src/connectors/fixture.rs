// src/connectors/fixture.rs
//
// Offline TVL source backed by saved DefiLlama responses on disk.
// Each protocol is read from `<dir>/<slug>.json`.

use super::llama::parse_protocol_body;
use crate::models::{Protocol, TvlHistory};
use crate::traits::{SharedTvlSource, TvlSource};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A TvlSource that reads recorded API responses from a directory.
pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug))
    }

    pub fn shared(self) -> SharedTvlSource {
        Arc::new(self)
    }
}

#[async_trait]
impl TvlSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch_history(&self, protocol: &Protocol) -> Result<Option<TvlHistory>, String> {
        let path = self.path_for(&protocol.slug);
        if !path.exists() {
            debug!("FixtureSource: No file for {} at {}", protocol.slug, path.display());
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let body: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

        Ok(parse_protocol_body(protocol, &body))
    }
}
