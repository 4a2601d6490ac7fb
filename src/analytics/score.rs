// src/analytics/score.rs
//
// Adoption Quality Score: min-max normalized growth blended with
// normalized stability (one minus normalized volatility).

use super::AnalysisParams;
use crate::models::{AdoptionMetrics, ScoredProtocol};
use std::cmp::Ordering;

/// Min-max normalizes values into [0, 1].
///
/// A degenerate range (all values equal, or a single value) maps to 0.0.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}

/// Scores every protocol and returns them ranked, best first.
///
/// Ties are broken by protocol name so the order is stable across refreshes.
pub fn rank(metrics: Vec<AdoptionMetrics>, params: &AnalysisParams) -> Vec<ScoredProtocol> {
    let growth: Vec<f64> = metrics.iter().map(|m| m.growth_rate).collect();
    let volatility: Vec<f64> = metrics.iter().map(|m| m.volatility).collect();
    let norm_growth = min_max_normalize(&growth);
    let norm_volatility = min_max_normalize(&volatility);

    let mut scored: Vec<ScoredProtocol> = metrics
        .into_iter()
        .zip(norm_growth)
        .zip(norm_volatility)
        .map(|((metrics, norm_growth), norm_volatility)| ScoredProtocol {
            metrics,
            norm_growth,
            norm_volatility,
            adoption_quality_score: norm_growth * params.growth_weight
                + (1.0 - norm_volatility) * params.stability_weight,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.adoption_quality_score
            .partial_cmp(&a.adoption_quality_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.metrics.protocol.cmp(&b.metrics.protocol))
    });
    scored
}
