// src/analytics/mod.rs

pub mod metrics;
pub mod score;
pub mod series;

pub use metrics::{adoption_metrics, compute_adoption_metrics, overview, snapshot};
pub use score::{min_max_normalize, rank};
pub use series::{mean_defined, pct_change, rolling_std, series_points};

use serde::{Deserialize, Serialize};

/// Tunables for metric computation and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Histories shorter than this are left out of the ranking
    pub min_history_points: usize,
    /// Rolling window (days) for the volatility estimate
    pub volatility_window: usize,
    /// Weight on normalized growth
    pub growth_weight: f64,
    /// Weight on normalized stability (1 - normalized volatility)
    pub stability_weight: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_history_points: 14,
            volatility_window: 7,
            growth_weight: 0.6,
            stability_weight: 0.4,
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.volatility_window < 2 {
            return Err(format!(
                "volatility_window must be at least 2, got {}",
                self.volatility_window
            ));
        }
        if self.min_history_points <= self.volatility_window {
            return Err(format!(
                "min_history_points ({}) must exceed volatility_window ({})",
                self.min_history_points, self.volatility_window
            ));
        }
        if self.growth_weight < 0.0 || self.stability_weight < 0.0 {
            return Err("Score weights must be non-negative".to_string());
        }
        if self.growth_weight + self.stability_weight <= 0.0 {
            return Err("At least one score weight must be positive".to_string());
        }
        Ok(())
    }
}
