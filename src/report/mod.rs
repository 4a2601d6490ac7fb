// src/report/mod.rs
//
// Assembles the adoption report from cached histories and renders it for the terminal.

use crate::analytics::{self, AnalysisParams};
use crate::cache::format_timestamp;
use crate::models::{Overview, ProtocolSnapshot, ScoredProtocol, SeriesPoint, TvlHistory};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const NO_DATA_MESSAGE: &str = "No Solana DeFi protocol data could be loaded.";

pub const DATA_SOURCE_CAPTION: &str =
    "Data Source: DefiLlama | Framework: Growth-Stability Adoption Model";

/// Reading guide shown under the ranking.
pub const INTERPRETATION: &[(&str, &str)] = &[
    ("High AQS", "Sustainable adoption and sticky capital"),
    ("High growth + high volatility", "Speculative inflows"),
    ("Low volatility + steady growth", "Mature protocol usage"),
];

/// Everything the terminal report and the dashboard display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionReport {
    /// Unix seconds when the report was built
    pub generated_at: u64,
    /// Unix seconds of the underlying cache refresh
    pub data_updated_at: u64,
    pub overview: Overview,
    /// Latest TVL per protocol, highest first
    pub snapshots: Vec<ProtocolSnapshot>,
    /// Scored protocols, best first
    pub ranking: Vec<ScoredProtocol>,
    /// Protocols with TVL whose history is too short or yields undefined metrics
    pub unranked: Vec<String>,
}

impl AdoptionReport {
    /// Builds the report. Fails when no protocol has any TVL data.
    pub fn build(
        histories: &[TvlHistory],
        params: &AnalysisParams,
        data_updated_at: u64,
    ) -> Result<Self, String> {
        let mut snapshots = analytics::snapshot(histories);
        if snapshots.is_empty() {
            return Err(NO_DATA_MESSAGE.to_string());
        }
        snapshots.sort_by(|a, b| b.tvl.total_cmp(&a.tvl));

        let overview = analytics::overview(&snapshots);
        let ranking = analytics::rank(analytics::compute_adoption_metrics(histories, params), params);

        let unranked = snapshots
            .iter()
            .filter(|s| !ranking.iter().any(|r| r.metrics.slug == s.slug))
            .map(|s| s.name.clone())
            .collect();

        Ok(Self {
            generated_at: crate::cache::now_secs(),
            data_updated_at,
            overview,
            snapshots,
            ranking,
            unranked,
        })
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize report: {}", e))
    }

    /// Plain-text report for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Solana DeFi Adoption & User Behavior Report");
        let _ = writeln!(out, "Data as of {}", format_timestamp(self.data_updated_at));
        let _ = writeln!(out);

        let _ = writeln!(out, "== Protocol Overview ==");
        let _ = writeln!(out, "  Protocols Analyzed: {}", self.overview.protocols_analyzed);
        let _ = writeln!(
            out,
            "  Top TVL Protocol:   {}",
            self.overview.top_protocol.as_deref().unwrap_or("-")
        );
        let _ = writeln!(out, "  Average TVL ($):    {}", format_usd(self.overview.average_tvl));
        let _ = writeln!(out);

        let _ = writeln!(out, "== Protocol TVL Comparison ==");
        let max_tvl = self.snapshots.first().map(|s| s.tvl).unwrap_or(0.0);
        for snap in &self.snapshots {
            let _ = writeln!(
                out,
                "  {:<12} {:>20}  {}",
                snap.name,
                format_usd(snap.tvl),
                bar(snap.tvl, max_tvl, 30)
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "== Adoption Quality Score (AQS) ==");
        if self.ranking.is_empty() {
            let _ = writeln!(out, "  Not enough history to score any protocol.");
        } else {
            let _ = writeln!(
                out,
                "  {:<4} {:<12} {:>12} {:>12} {:>8}",
                "#", "Protocol", "Growth", "Volatility", "AQS"
            );
            for (i, scored) in self.ranking.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:<4} {:<12} {:>11.2}% {:>12.5} {:>8.3}",
                    i + 1,
                    scored.metrics.protocol,
                    scored.metrics.growth_rate * 100.0,
                    scored.metrics.volatility,
                    scored.adoption_quality_score
                );
            }
        }
        if !self.unranked.is_empty() {
            let _ = writeln!(
                out,
                "  Unranked (insufficient or undefined history): {}",
                self.unranked.join(", ")
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "== How to Interpret ==");
        for (signal, meaning) in INTERPRETATION {
            let _ = writeln!(out, "  {} -> {}", signal, meaning);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", DATA_SOURCE_CAPTION);

        out
    }
}

/// Tabulates one protocol's TVL trend and rolling volatility.
pub fn render_series(name: &str, points: &[SeriesPoint], window: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} - TVL Trend and Volatility ({}-Day)", name, window);
    let _ = writeln!(out, "  {:<12} {:>20} {:>10} {:>12}", "Date", "TVL ($)", "Change", "Volatility");
    for point in points {
        let date = chrono::DateTime::from_timestamp(point.date, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| point.date.to_string());
        let change = point
            .daily_change
            .map(|c| format!("{:.2}%", c * 100.0))
            .unwrap_or_else(|| "-".to_string());
        let vol = point
            .rolling_volatility
            .map(|v| format!("{:.5}", v))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  {:<12} {:>20} {:>10} {:>12}", date, format_usd(point.tvl), change, vol);
    }
    out
}

/// Formats a dollar amount with thousands separators and no decimals.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * width as f64).round() as usize;
    "#".repeat(len.clamp(1, width))
}
