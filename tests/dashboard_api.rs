// tests/dashboard_api.rs
//
// Serves the dashboard router on an ephemeral port and exercises the REST API
// and the WebSocket feed.

mod common;

use common::{choppy, cleanup, fixture_dir, steady, write_fixture};
use futures::StreamExt;
use solana_adoption::analytics::AnalysisParams;
use solana_adoption::cache::TvlCache;
use solana_adoption::connectors::FixtureSource;
use solana_adoption::dashboard::DashboardServer;
use solana_adoption::models::default_protocols;
use solana_adoption::traits::Refreshable;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn serve(server: &DashboardServer) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server.router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn test_dashboard_endpoints() {
    let dir = fixture_dir("dashboard");
    write_fixture(&dir, "raydium", &steady(30, 1.0e9));
    write_fixture(&dir, "orca", &choppy(30, 5.0e8));

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    cache.refresh().await.unwrap();

    let server = DashboardServer::new(cache, AnalysisParams::default(), 0, 60);
    let mut updates = server.subscribe();
    server.state().rebuild_report().await.unwrap();

    let pushed = updates.recv().await.unwrap();
    assert_eq!(pushed.ranking.len(), 2);

    let addr = serve(&server).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let index = client.get(&base).send().await.unwrap();
    assert!(index.status().is_success());
    assert!(index.text().await.unwrap().contains("Adoption Quality Score"));

    let report: serde_json::Value = client
        .get(format!("{}/api/report", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["overview"]["protocols_analyzed"], 2);

    let ranking: serde_json::Value = client
        .get(format!("{}/api/ranking", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ranking[0]["slug"], "orca");

    let protocols: serde_json::Value = client
        .get(format!("{}/api/protocols", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(protocols.as_array().unwrap().len(), 2);

    let history: serde_json::Value = client
        .get(format!("{}/api/protocols/raydium/history", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["protocol"]["name"], "Raydium");
    assert_eq!(history["window"], 7);
    assert_eq!(history["points"].as_array().unwrap().len(), 30);

    let missing = client
        .get(format!("{}/api/protocols/marinade/history", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    cleanup(&dir);
}

#[tokio::test]
async fn test_report_endpoint_before_data() {
    let dir = fixture_dir("dashboard_empty");

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    let server = DashboardServer::new(cache, AnalysisParams::default(), 0, 60);
    let addr = serve(&server).await;

    let res = reqwest::get(format!("http://{}/api/report", addr)).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    cleanup(&dir);
}

/// Reads the next text frame from the socket as JSON.
async fn next_report<S>(ws: &mut S) -> serde_json::Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for report")
            .expect("WebSocket closed")
            .expect("WebSocket error");
        if let Message::Text(_) = msg {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_websocket_pushes_current_and_rebuilt_reports() {
    let dir = fixture_dir("dashboard_ws");
    write_fixture(&dir, "raydium", &steady(30, 1.0e9));

    let cache = TvlCache::in_memory(FixtureSource::new(&dir).shared(), default_protocols());
    cache.refresh().await.unwrap();

    let server = DashboardServer::new(cache.clone(), AnalysisParams::default(), 0, 60);
    server.state().rebuild_report().await.unwrap();
    let addr = serve(&server).await;

    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

    // Current report on connect
    let initial = next_report(&mut ws).await;
    assert_eq!(initial["overview"]["protocols_analyzed"], 1);
    assert_eq!(initial["overview"]["top_protocol"], "Raydium");

    // New data, then a rebuild as the refresh loop would do
    write_fixture(&dir, "orca", &choppy(30, 5.0e9));
    cache.refresh().await.unwrap();
    server.state().rebuild_report().await.unwrap();

    let pushed = next_report(&mut ws).await;
    assert_eq!(pushed["overview"]["protocols_analyzed"], 2);
    assert_eq!(pushed["overview"]["top_protocol"], "Orca");
    assert_eq!(pushed["ranking"].as_array().unwrap().len(), 2);

    cleanup(&dir);
}
