// src/analytics/metrics.rs
//
// Per-protocol adoption metrics: latest TVL, growth and volatility.

use super::series::{mean_defined, pct_change, rolling_std};
use super::AnalysisParams;
use crate::models::{AdoptionMetrics, Overview, ProtocolSnapshot, TvlHistory};
use log::debug;

/// Latest TVL for each protocol that has at least one observation.
pub fn snapshot(histories: &[TvlHistory]) -> Vec<ProtocolSnapshot> {
    histories
        .iter()
        .filter_map(|h| {
            h.latest().map(|p| ProtocolSnapshot {
                name: h.protocol.name.clone(),
                slug: h.protocol.slug.clone(),
                tvl: p.total_liquidity_usd,
            })
        })
        .collect()
}

/// Growth and volatility for one protocol.
///
/// Returns `None` when the history is shorter than `min_history_points`, or when
/// either metric is undefined (zero starting TVL, no full volatility window).
pub fn adoption_metrics(history: &TvlHistory, params: &AnalysisParams) -> Option<AdoptionMetrics> {
    if history.len() < params.min_history_points {
        debug!(
            "{}: {} points, need {}",
            history.protocol.slug,
            history.len(),
            params.min_history_points
        );
        return None;
    }

    let first = history.first()?.total_liquidity_usd;
    let last = history.latest()?.total_liquidity_usd;
    let growth_rate = last / first - 1.0;
    if !growth_rate.is_finite() {
        debug!("{}: growth undefined (first TVL {})", history.protocol.slug, first);
        return None;
    }

    let changes = pct_change(&history.values());
    let volatility = mean_defined(&rolling_std(&changes, params.volatility_window))?;
    if !volatility.is_finite() {
        return None;
    }

    Some(AdoptionMetrics {
        protocol: history.protocol.name.clone(),
        slug: history.protocol.slug.clone(),
        growth_rate,
        volatility,
    })
}

/// Metrics for every history that qualifies.
pub fn compute_adoption_metrics(
    histories: &[TvlHistory],
    params: &AnalysisParams,
) -> Vec<AdoptionMetrics> {
    histories
        .iter()
        .filter_map(|h| adoption_metrics(h, params))
        .collect()
}

/// Count, top protocol by TVL, and average TVL.
///
/// On equal TVL the earliest snapshot wins, so a list already sorted by TVL
/// reports its head.
pub fn overview(snapshots: &[ProtocolSnapshot]) -> Overview {
    let top_protocol = snapshots
        .iter()
        .reduce(|best, s| if s.tvl.total_cmp(&best.tvl).is_gt() { s } else { best })
        .map(|s| s.name.clone());

    let average_tvl = if snapshots.is_empty() {
        0.0
    } else {
        snapshots.iter().map(|s| s.tvl).sum::<f64>() / snapshots.len() as f64
    };

    Overview {
        protocols_analyzed: snapshots.len(),
        top_protocol,
        average_tvl,
    }
}
