// tests/offline_report.rs
//
// End-to-end: fixture directory -> cache -> report.

mod common;

use common::{choppy, cleanup, fixture_dir, steady, write_fixture};
use solana_adoption::analytics::{series_points, AnalysisParams};
use solana_adoption::cache::TvlCache;
use solana_adoption::connectors::FixtureSource;
use solana_adoption::models::default_protocols;
use solana_adoption::report::{AdoptionReport, NO_DATA_MESSAGE};
use solana_adoption::traits::Refreshable;

#[tokio::test]
async fn test_report_from_fixtures() {
    let dir = fixture_dir("report");
    write_fixture(&dir, "raydium", &steady(30, 1.0e9));
    write_fixture(&dir, "orca", &choppy(30, 5.0e8));
    write_fixture(&dir, "jupiter", &steady(10, 2.0e9));
    write_fixture(&dir, "drift", &[]);
    // marinade has no fixture at all

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    let changed = cache.refresh().await.unwrap();
    assert_eq!(changed, 3);

    let params = AnalysisParams::default();
    let report = AdoptionReport::build(&cache.histories(), &params, cache.last_updated()).unwrap();

    // Overview covers every protocol with any TVL
    assert_eq!(report.overview.protocols_analyzed, 3);
    assert_eq!(report.overview.top_protocol.as_deref(), Some("Jupiter"));
    let expected_avg = report.snapshots.iter().map(|s| s.tvl).sum::<f64>() / 3.0;
    assert!((report.overview.average_tvl - expected_avg).abs() < 1e-3);

    // Snapshots sorted by TVL, highest first
    let tvls: Vec<f64> = report.snapshots.iter().map(|s| s.tvl).collect();
    assert!(tvls.windows(2).all(|w| w[0] >= w[1]));

    // Jupiter has too little history to score
    assert_eq!(report.unranked, vec!["Jupiter".to_string()]);
    assert_eq!(report.ranking.len(), 2);

    // Orca grows faster but swings hard; Raydium is perfectly stable
    let orca = &report.ranking[0];
    let raydium = &report.ranking[1];
    assert_eq!(orca.metrics.slug, "orca");
    assert_eq!(raydium.metrics.slug, "raydium");
    assert!(orca.metrics.volatility > raydium.metrics.volatility);
    assert!((orca.adoption_quality_score - 0.6).abs() < 1e-9);
    assert!((raydium.adoption_quality_score - 0.4).abs() < 1e-9);
    assert!((raydium.metrics.growth_rate - (1.01_f64.powi(29) - 1.0)).abs() < 1e-9);

    let text = report.render_text();
    assert!(text.contains("Protocols Analyzed: 3"));
    assert!(text.contains("Orca"));

    cleanup(&dir);
}

#[tokio::test]
async fn test_series_for_selected_protocol() {
    let dir = fixture_dir("series");
    write_fixture(&dir, "orca", &choppy(20, 1.0e8));

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    cache.refresh().await.unwrap();

    let history = cache.history("orca").unwrap();
    let points = series_points(&history, 7);
    assert_eq!(points.len(), 20);
    assert!(points[..7].iter().all(|p| p.rolling_volatility.is_none()));
    assert!(points[7..].iter().all(|p| p.rolling_volatility.is_some()));

    cleanup(&dir);
}

#[tokio::test]
async fn test_no_data_stops_report() {
    let dir = fixture_dir("empty");

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    cache.refresh().await.unwrap();
    assert!(cache.is_empty());

    let err = AdoptionReport::build(&cache.histories(), &AnalysisParams::default(), 0).unwrap_err();
    assert_eq!(err, NO_DATA_MESSAGE);

    cleanup(&dir);
}
