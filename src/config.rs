// src/config.rs
//
// Configuration file parsing.
// Supports TOML config files that set the protocol list, data source,
// cache location, analysis parameters and dashboard settings.

use crate::analytics::AnalysisParams;
use crate::cache::{DEFAULT_CACHE_PATH, DEFAULT_STALE_THRESHOLD_SECS};
use crate::connectors::llama::{DEFAULT_TIMEOUT_SECS, DEFILLAMA_API_URL};
use crate::models::{default_protocols, Protocol};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// =============================================================================
// Configuration Types
// =============================================================================

/// Root configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,
    /// Where TVL data comes from and where it is cached
    #[serde(default)]
    pub source: SourceConfig,
    /// Metric and scoring parameters
    #[serde(default)]
    pub analysis: AnalysisParams,
    /// Protocols to analyze (defaults to the built-in Solana set)
    #[serde(default = "default_protocols")]
    pub protocols: Vec<Protocol>,
}

/// Global configuration settings.
#[derive(Debug, Deserialize)]
pub struct GlobalConfig {
    /// Dashboard port (None = no dashboard unless --dashboard is passed)
    pub dashboard_port: Option<u16>,
    /// Log level (overridden by RUST_LOG)
    pub log_level: Option<String>,
    /// Dashboard refresh interval in seconds
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_refresh_secs() -> u64 {
    900
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dashboard_port: None,
            log_level: None,
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// Data source and cache settings.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// DefiLlama API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// HTTP timeout per request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// JSONL cache file
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// Age after which cached data is refetched
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            cache_path: default_cache_path(),
            stale_threshold_secs: default_stale_threshold_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFILLAMA_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_cache_path() -> String {
    DEFAULT_CACHE_PATH.to_string()
}

fn default_stale_threshold_secs() -> u64 {
    DEFAULT_STALE_THRESHOLD_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            source: SourceConfig::default(),
            analysis: AnalysisParams::default(),
            protocols: default_protocols(),
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, String> {
        let config: Config =
            toml::from_str(s).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.analysis.validate()?;

        if self.protocols.is_empty() {
            return Err("At least one protocol must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for protocol in &self.protocols {
            if protocol.slug.trim().is_empty() {
                return Err(format!("Protocol '{}' has an empty slug", protocol.name));
            }
            if !seen.insert(protocol.slug.as_str()) {
                return Err(format!("Duplicate protocol slug: {}", protocol.slug));
            }
        }

        if self.global.refresh_secs == 0 {
            return Err("refresh_secs must be positive".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns a default configuration string for documentation.
pub fn default_config_template() -> &'static str {
    r#"# Solana DeFi Adoption Analyzer Configuration
#
# Every section is optional; missing values fall back to the defaults shown here.

[global]
# Web dashboard port (optional)
dashboard_port = 8080

# How often the dashboard refetches TVL data, in seconds
refresh_secs = 900

[source]
base_url = "https://api.llama.fi"
timeout_secs = 30
cache_path = "cache/tvl_history.jsonl"
# Cached data older than this is refetched
stale_threshold_secs = 3600

[analysis]
# Protocols with fewer daily points are not scored
min_history_points = 14
# Rolling window (days) for TVL volatility
volatility_window = 7
# AQS = norm_growth * growth_weight + (1 - norm_volatility) * stability_weight
growth_weight = 0.6
stability_weight = 0.4

[[protocols]]
name = "Raydium"
slug = "raydium"

[[protocols]]
name = "Orca"
slug = "orca"

[[protocols]]
name = "Jupiter"
slug = "jupiter"

[[protocols]]
name = "Marinade"
slug = "marinade"

[[protocols]]
name = "Drift"
slug = "drift"
"#
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.global.refresh_secs, 900);
        assert_eq!(config.source.base_url, DEFILLAMA_API_URL);
        assert_eq!(config.analysis, AnalysisParams::default());
        assert_eq!(config.protocols.len(), 5);
    }

    #[test]
    fn test_template_parses() {
        let config = Config::from_str(default_config_template()).unwrap();
        assert_eq!(config.global.dashboard_port, Some(8080));
        assert_eq!(config.protocols, default_protocols());
        assert_eq!(config.source.cache_path, DEFAULT_CACHE_PATH);
    }

    #[test]
    fn test_parse_custom_config() {
        let config_str = r#"
            [analysis]
            volatility_window = 5
            min_history_points = 30

            [[protocols]]
            name = "Kamino"
            slug = "kamino"
        "#;

        let config = Config::from_str(config_str).unwrap();
        assert_eq!(config.analysis.volatility_window, 5);
        assert_eq!(config.analysis.min_history_points, 30);
        assert_eq!(config.analysis.growth_weight, 0.6);
        assert_eq!(config.protocols, vec![Protocol::new("Kamino", "kamino")]);
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let config_str = r#"
            [[protocols]]
            name = "Orca"
            slug = "orca"

            [[protocols]]
            name = "Orca Again"
            slug = "orca"
        "#;

        let err = Config::from_str(config_str).unwrap_err();
        assert!(err.contains("Duplicate protocol slug"));
    }

    #[test]
    fn test_invalid_analysis_rejected() {
        let config_str = r#"
            [analysis]
            volatility_window = 20
        "#;

        assert!(Config::from_str(config_str).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_str("[global").unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }
}
