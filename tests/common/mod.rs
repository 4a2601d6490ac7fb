// tests/common/mod.rs
//
// Shared helpers: writes DefiLlama-shaped fixture files into a temp directory.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

pub const DAY: i64 = 86_400;
pub const START: i64 = 1_700_000_000;

/// Creates a fresh, unique temp directory.
pub fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "solana_adoption_{}_{}",
        name,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::create_dir_all(&dir).expect("Failed to create fixture directory");
    dir
}

/// Writes `<dir>/<slug>.json` in the /protocol/{slug} response shape.
pub fn write_fixture(dir: &PathBuf, slug: &str, values: &[f64]) {
    let tvl: Vec<serde_json::Value> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::json!({
                "date": START + i as i64 * DAY,
                "totalLiquidityUSD": v,
            })
        })
        .collect();
    let body = serde_json::json!({ "name": slug, "tvl": tvl });
    fs::write(dir.join(format!("{}.json", slug)), body.to_string())
        .expect("Failed to write fixture");
}

/// Steady 1% daily growth.
pub fn steady(days: usize, start: f64) -> Vec<f64> {
    (0..days).map(|i| start * 1.01_f64.powi(i as i32)).collect()
}

/// Alternating +/-20% swings with a net gain.
pub fn choppy(days: usize, start: f64) -> Vec<f64> {
    (0..days)
        .map(|i| {
            let trend = start * (1.0 + 0.03 * i as f64);
            if i % 2 == 0 { trend } else { trend * 1.2 }
        })
        .collect()
}

pub fn cleanup(dir: &PathBuf) {
    let _ = fs::remove_dir_all(dir);
}
