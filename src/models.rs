// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Protocols
// =============================================================================

/// A tracked DeFi protocol, identified on DefiLlama by its slug.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Protocol {
    /// Display name (e.g., "Raydium")
    pub name: String,
    /// DefiLlama slug (e.g., "raydium")
    pub slug: String,
}

impl Protocol {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.slug)
    }
}

/// The stable set of Solana protocols analyzed when no config overrides it.
pub fn default_protocols() -> Vec<Protocol> {
    vec![
        Protocol::new("Raydium", "raydium"),
        Protocol::new("Orca", "orca"),
        Protocol::new("Jupiter", "jupiter"),
        Protocol::new("Marinade", "marinade"),
        Protocol::new("Drift", "drift"),
    ]
}

// =============================================================================
// TVL Time Series
// =============================================================================

/// One daily TVL observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TvlPoint {
    /// Unix timestamp in seconds
    pub date: i64,
    /// Total liquidity in USD
    pub total_liquidity_usd: f64,
}

/// TVL history for a single protocol, always sorted ascending by date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TvlHistory {
    pub protocol: Protocol,
    pub points: Vec<TvlPoint>,
}

impl TvlHistory {
    /// Creates a history, sorting the points by date.
    pub fn new(protocol: Protocol, mut points: Vec<TvlPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { protocol, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent observation.
    pub fn latest(&self) -> Option<&TvlPoint> {
        self.points.last()
    }

    /// Oldest observation.
    pub fn first(&self) -> Option<&TvlPoint> {
        self.points.first()
    }

    /// TVL values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total_liquidity_usd).collect()
    }
}

// =============================================================================
// Analysis Results
// =============================================================================

/// Latest TVL for one protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub name: String,
    pub slug: String,
    pub tvl: f64,
}

/// A chart row for a protocol's TVL trend and rolling volatility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: i64,
    pub tvl: f64,
    pub daily_change: Option<f64>,
    pub rolling_volatility: Option<f64>,
}

/// Growth and volatility for one protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdoptionMetrics {
    pub protocol: String,
    pub slug: String,
    /// last / first - 1
    pub growth_rate: f64,
    /// Mean of the rolling std of daily % change
    pub volatility: f64,
}

/// Metrics plus their normalized values and the resulting score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredProtocol {
    #[serde(flatten)]
    pub metrics: AdoptionMetrics,
    pub norm_growth: f64,
    pub norm_volatility: f64,
    pub adoption_quality_score: f64,
}

/// Headline numbers across all loaded protocols.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub protocols_analyzed: usize,
    pub top_protocol: Option<String>,
    pub average_tvl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_sorted_on_construction() {
        let history = TvlHistory::new(
            Protocol::new("Orca", "orca"),
            vec![
                TvlPoint { date: 300, total_liquidity_usd: 3.0 },
                TvlPoint { date: 100, total_liquidity_usd: 1.0 },
                TvlPoint { date: 200, total_liquidity_usd: 2.0 },
            ],
        );
        assert_eq!(history.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(history.latest().unwrap().date, 300);
        assert_eq!(history.first().unwrap().date, 100);
    }

    #[test]
    fn test_default_protocols() {
        let protocols = default_protocols();
        assert_eq!(protocols.len(), 5);
        assert_eq!(protocols[0].slug, "raydium");
        assert_eq!(protocols[4].name, "Drift");
    }

    #[test]
    fn test_scored_protocol_serializes_flat() {
        let scored = ScoredProtocol {
            metrics: AdoptionMetrics {
                protocol: "Orca".to_string(),
                slug: "orca".to_string(),
                growth_rate: 0.5,
                volatility: 0.02,
            },
            norm_growth: 1.0,
            norm_volatility: 0.0,
            adoption_quality_score: 1.0,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["protocol"], "Orca");
        assert_eq!(json["adoption_quality_score"], 1.0);
    }
}
