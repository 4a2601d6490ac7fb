// src/connectors/llama.rs
//
// DefiLlama REST client.
// Fetches the daily TVL series for a protocol from the public /protocol/{slug} endpoint.

use crate::models::{Protocol, TvlHistory, TvlPoint};
use crate::traits::{SharedTvlSource, TvlSource};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFILLAMA_API_URL: &str = "https://api.llama.fi";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the DefiLlama protocol API.
pub struct DefiLlamaClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DefiLlamaClient {
    /// Creates a client against the public API.
    pub fn new() -> Self {
        Self::with_base_url(DEFILLAMA_API_URL, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client against a custom base URL (mirrors, local test servers).
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn protocol_url(&self, slug: &str) -> String {
        format!("{}/protocol/{}", self.base_url, slug)
    }

    /// Wraps this client for sharing.
    pub fn shared(self) -> SharedTvlSource {
        Arc::new(self)
    }
}

impl Default for DefiLlamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TvlSource for DefiLlamaClient {
    fn name(&self) -> &str {
        "defillama"
    }

    async fn fetch_history(&self, protocol: &Protocol) -> Result<Option<TvlHistory>, String> {
        let url = self.protocol_url(&protocol.slug);
        debug!("DefiLlamaClient: GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            warn!(
                "DefiLlamaClient: Failed to fetch {}: {}",
                protocol.slug,
                response.status()
            );
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        Ok(parse_protocol_body(protocol, &body))
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Extracts the TVL series from a DefiLlama protocol response.
///
/// Returns `None` when `tvl` is missing or not a list, when the list is empty,
/// or when no entry carries `totalLiquidityUSD`. Entries without a usable
/// date or liquidity value are skipped.
pub fn parse_protocol_body(protocol: &Protocol, body: &Value) -> Option<TvlHistory> {
    let entries = body.get("tvl")?.as_array()?;
    if entries.is_empty() {
        return None;
    }

    let points: Vec<TvlPoint> = entries
        .iter()
        .filter_map(|entry| {
            let date = number_as_i64(entry.get("date")?)?;
            let total_liquidity_usd = number_as_f64(entry.get("totalLiquidityUSD")?)?;
            Some(TvlPoint {
                date,
                total_liquidity_usd,
            })
        })
        .collect();

    if points.is_empty() {
        return None;
    }

    if points.len() < entries.len() {
        debug!(
            "DefiLlamaClient: {} skipped {} malformed entries",
            protocol.slug,
            entries.len() - points.len()
        );
    }

    Some(TvlHistory::new(protocol.clone(), points))
}

// DefiLlama has served dates both as integers and as numeric strings.
fn number_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

// "NaN" and "inf" parse as f64 but are not liquidity values.
fn number_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    fn orca() -> Protocol {
        Protocol::new("Orca", "orca")
    }

    #[test]
    fn test_parse_valid_body() {
        let body = json!({
            "name": "Orca",
            "tvl": [
                {"date": 1700086400, "totalLiquidityUSD": 210.0},
                {"date": 1700000000, "totalLiquidityUSD": 200.0}
            ]
        });

        let history = parse_protocol_body(&orca(), &body).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.first().unwrap().total_liquidity_usd, 200.0);
        assert_eq!(history.latest().unwrap().total_liquidity_usd, 210.0);
    }

    #[test]
    fn test_parse_missing_tvl() {
        let body = json!({"name": "Orca"});
        assert!(parse_protocol_body(&orca(), &body).is_none());
    }

    #[test]
    fn test_parse_tvl_not_list() {
        let body = json!({"tvl": 1234.5});
        assert!(parse_protocol_body(&orca(), &body).is_none());
    }

    #[test]
    fn test_parse_empty_tvl() {
        let body = json!({"tvl": []});
        assert!(parse_protocol_body(&orca(), &body).is_none());
    }

    #[test]
    fn test_parse_without_liquidity_column() {
        let body = json!({"tvl": [{"date": 1700000000, "tokens": 5}]});
        assert!(parse_protocol_body(&orca(), &body).is_none());
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let body = json!({
            "tvl": [
                {"date": "1700000000", "totalLiquidityUSD": 100.0},
                {"date": 1700086400},
                {"date": 1700172800, "totalLiquidityUSD": "120.5"}
            ]
        });

        let history = parse_protocol_body(&orca(), &body).unwrap();
        assert_eq!(history.values(), vec![100.0, 120.5]);
    }

    #[test]
    fn test_protocol_url() {
        let client = DefiLlamaClient::with_base_url("http://localhost:9999/", 5);
        assert_eq!(client.protocol_url("drift"), "http://localhost:9999/protocol/drift");
    }

    #[test]
    fn test_parse_skips_non_finite_values() {
        let body = json!({
            "tvl": [
                {"date": 1700000000, "totalLiquidityUSD": "NaN"},
                {"date": 1700086400, "totalLiquidityUSD": "inf"},
                {"date": 1700172800, "totalLiquidityUSD": "-infinity"},
                {"date": 1700259200, "totalLiquidityUSD": 150.0}
            ]
        });

        let history = parse_protocol_body(&orca(), &body).unwrap();
        assert_eq!(history.values(), vec![150.0]);

        let only_nan = json!({"tvl": [{"date": 1700000000, "totalLiquidityUSD": "NaN"}]});
        assert!(parse_protocol_body(&orca(), &only_nan).is_none());
    }

    #[tokio::test]
    async fn test_fetch_history_success() {
        let app = Router::new().route(
            "/protocol/orca",
            get(|| async {
                Json(json!({
                    "name": "Orca",
                    "tvl": [{"date": 1700000000, "totalLiquidityUSD": 250.0}]
                }))
            }),
        );
        let addr = serve(app).await;

        let client = DefiLlamaClient::with_base_url(&format!("http://{}", addr), 5);
        let history = client.fetch_history(&orca()).await.unwrap().unwrap();
        assert_eq!(history.protocol, orca());
        assert_eq!(history.values(), vec![250.0]);
    }

    #[tokio::test]
    async fn test_fetch_history_non_success_is_none() {
        // Only orca is routed; every other slug gets axum's 404
        let app = Router::new().route("/protocol/orca", get(|| async { "unused" }));
        let addr = serve(app).await;

        let client = DefiLlamaClient::with_base_url(&format!("http://{}", addr), 5);
        let result = client
            .fetch_history(&Protocol::new("Drift", "drift"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_history_connection_refused_is_err() {
        // Reserve a port, then close it so nothing is listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DefiLlamaClient::with_base_url(&format!("http://{}", addr), 5);
        let err = client.fetch_history(&orca()).await.unwrap_err();
        assert!(err.starts_with("HTTP request failed"));
    }
}
