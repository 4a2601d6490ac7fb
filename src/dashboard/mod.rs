// src/dashboard/mod.rs

//! Dashboard server for the adoption report.
//!
//! Provides a web server that:
//! - Serves a single-page frontend with TVL, volatility and AQS charts
//! - Exposes REST endpoints for the report and per-protocol series
//! - Pushes rebuilt reports to WebSocket clients after each refresh

use crate::analytics::{series_points, AnalysisParams};
use crate::cache::TvlCache;
use crate::models::{Protocol, SeriesPoint};
use crate::report::{AdoptionReport, NO_DATA_MESSAGE};
use crate::traits::Refreshable;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Shared state for the dashboard server.
pub struct DashboardState {
    cache: Arc<TvlCache>,
    params: AnalysisParams,
    report: RwLock<Option<AdoptionReport>>,
    update_tx: broadcast::Sender<AdoptionReport>,
}

impl DashboardState {
    /// Rebuilds the report from the cache and broadcasts it.
    pub async fn rebuild_report(&self) -> Result<(), String> {
        let histories = self.cache.histories();
        let report = AdoptionReport::build(&histories, &self.params, self.cache.last_updated())?;

        *self.report.write().await = Some(report.clone());
        // Ignore send errors (no receivers)
        let _ = self.update_tx.send(report);
        Ok(())
    }

    pub async fn report(&self) -> Option<AdoptionReport> {
        self.report.read().await.clone()
    }
}

/// The dashboard server that serves the web UI and API endpoints.
pub struct DashboardServer {
    state: Arc<DashboardState>,
    port: u16,
    refresh_secs: u64,
}

impl DashboardServer {
    /// Creates a new dashboard server.
    ///
    /// # Arguments
    /// * `cache` - TVL cache the report is built from
    /// * `params` - Analysis parameters for metrics and scoring
    /// * `port` - Port to listen on
    /// * `refresh_secs` - Interval between background refreshes
    pub fn new(cache: Arc<TvlCache>, params: AnalysisParams, port: u16, refresh_secs: u64) -> Self {
        let (update_tx, _) = broadcast::channel(16);

        Self {
            state: Arc::new(DashboardState {
                cache,
                params,
                report: RwLock::new(None),
                update_tx,
            }),
            port,
            refresh_secs: refresh_secs.max(1),
        }
    }

    pub fn state(&self) -> Arc<DashboardState> {
        self.state.clone()
    }

    /// Returns a receiver for report updates.
    pub fn subscribe(&self) -> broadcast::Receiver<AdoptionReport> {
        self.state.update_tx.subscribe()
    }

    /// Builds the axum router.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(serve_frontend))
            .route("/api/report", get(get_report))
            .route("/api/protocols", get(list_protocols))
            .route("/api/protocols/{slug}/history", get(get_protocol_history))
            .route("/api/ranking", get(get_ranking))
            .route("/ws", get(websocket_handler))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Starts the background refresh task and the web server.
    /// This method runs until the server is shut down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        spawn_refresh_loop(self.state.clone(), self.refresh_secs);

        let app = self.router();
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Dashboard server starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Refreshes the cache on an interval and rebuilds the report.
///
/// The first tick only refetches when the cache is empty or stale.
fn spawn_refresh_loop(state: Arc<DashboardState>, refresh_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs));
        let mut first = true;
        loop {
            interval.tick().await;

            let result = if first {
                state.cache.ensure_fresh().await
            } else {
                state.cache.refresh().await
            };
            first = false;

            match result {
                Ok(changed) => info!("Dashboard: Refresh complete, {} protocols changed", changed),
                Err(e) => error!("Dashboard: Refresh failed: {}", e),
            }

            if let Err(e) = state.rebuild_report().await {
                warn!("Dashboard: {}", e);
            }
        }
    });
}

/// GET / - Serves the main dashboard frontend
async fn serve_frontend() -> Html<&'static str> {
    Html(FRONTEND_HTML)
}

fn no_data() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, NO_DATA_MESSAGE).into_response()
}

/// GET /api/report - Full report
async fn get_report(State(state): State<Arc<DashboardState>>) -> Response {
    match state.report().await {
        Some(report) => Json(report).into_response(),
        None => no_data(),
    }
}

/// GET /api/protocols - Latest TVL per protocol
async fn list_protocols(State(state): State<Arc<DashboardState>>) -> Response {
    match state.report().await {
        Some(report) => Json(report.snapshots).into_response(),
        None => no_data(),
    }
}

/// GET /api/ranking - AQS ranking
async fn get_ranking(State(state): State<Arc<DashboardState>>) -> Response {
    match state.report().await {
        Some(report) => Json(report.ranking).into_response(),
        None => no_data(),
    }
}

/// Series returned by the history endpoint
#[derive(Serialize)]
struct ProtocolHistory {
    protocol: Protocol,
    window: usize,
    points: Vec<SeriesPoint>,
}

/// GET /api/protocols/{slug}/history - TVL trend and rolling volatility
async fn get_protocol_history(
    State(state): State<Arc<DashboardState>>,
    Path(slug): Path<String>,
) -> Response {
    match state.cache.history(&slug) {
        Some(history) => {
            let window = state.params.volatility_window;
            Json(ProtocolHistory {
                points: series_points(&history, window),
                protocol: history.protocol,
                window,
            })
            .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            "TVL history not available for this protocol",
        )
            .into_response(),
    }
}

/// GET /ws - WebSocket endpoint for report updates
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DashboardState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: Arc<DashboardState>) {
    info!("WebSocket client connected");

    // Subscribe before sending the current report so no rebuild is missed
    let mut rx = state.update_tx.subscribe();

    if let Some(report) = state.report().await {
        if let Ok(json) = serde_json::to_string(&report) {
            if socket.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(report) => {
                        if let Ok(json) = serde_json::to_string(&report) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        info!("WebSocket client lagged, skipped {} reports", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

/// Embedded frontend HTML with CSS and JavaScript
const FRONTEND_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Solana DeFi Adoption Dashboard</title>
    <style>
        :root {
            --bg-primary: #0b0b0f;
            --bg-card: #11111a;
            --bg-tertiary: #1a1a26;
            --border: #2a2a3d;
            --text-primary: #ffffff;
            --text-secondary: #8888a0;
            --purple: #9d5cff;
            --green: #14f195;
            --danger: #ef4444;
        }

        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            min-height: 100vh;
        }

        .container { max-width: 1400px; margin: 0 auto; padding: 24px; }

        header {
            display: flex;
            justify-content: space-between;
            align-items: center;
            margin-bottom: 24px;
            padding-bottom: 20px;
            border-bottom: 1px solid var(--border);
        }

        h1, h2 { color: var(--purple); }
        h1 { font-size: 24px; font-weight: 600; }
        h2 { font-size: 16px; margin-bottom: 16px; }

        .intro { color: var(--text-secondary); margin-bottom: 24px; line-height: 1.6; }

        .status { display: flex; align-items: center; gap: 8px; font-size: 14px; color: var(--text-secondary); }
        .status-dot { width: 8px; height: 8px; border-radius: 50%; background: var(--green); box-shadow: 0 0 8px var(--green); }
        .status-dot.disconnected { background: var(--danger); box-shadow: 0 0 8px var(--danger); }

        .metrics { display: grid; grid-template-columns: repeat(3, 1fr); gap: 16px; margin-bottom: 24px; }
        .metric { background: var(--bg-card); border-radius: 12px; padding: 16px; border: 1px solid var(--border); }
        .metric-label { font-size: 12px; color: var(--text-secondary); text-transform: uppercase; letter-spacing: 0.5px; margin-bottom: 6px; }
        .metric-value { font-family: monospace; font-size: 22px; color: var(--green); }

        .card { background: var(--bg-card); border: 1px solid var(--border); border-radius: 16px; padding: 24px; margin-bottom: 24px; }

        select {
            background: var(--bg-tertiary);
            color: var(--text-primary);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 8px 12px;
            margin-bottom: 16px;
            font-size: 14px;
        }

        svg text { fill: var(--text-secondary); font-size: 11px; font-family: monospace; }

        table { width: 100%; border-collapse: collapse; font-family: monospace; font-size: 13px; }
        th, td { text-align: right; padding: 8px; border-bottom: 1px solid var(--border); }
        th:first-child, td:first-child { text-align: left; }
        th { color: var(--text-secondary); font-weight: 500; }

        ul { margin-left: 20px; line-height: 1.8; color: var(--text-secondary); }
        .caption { color: var(--text-secondary); font-size: 12px; }
        .empty-state { text-align: center; padding: 60px 20px; color: var(--text-secondary); }
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Solana DeFi Adoption &amp; User Behavior Dashboard</h1>
            <div class="status">
                <div class="status-dot" id="statusDot"></div>
                <span id="statusText">Connecting...</span>
            </div>
        </header>

        <p class="intro">
            Adoption quality across major Solana DeFi protocols. Instead of relying solely on TVL,
            the score weighs <b>growth momentum</b> against <b>capital stability</b> to separate
            real usage from short-term speculative capital.
        </p>

        <div id="content">
            <div class="empty-state"><h2>Loading protocol data...</h2></div>
        </div>
    </div>

    <script>
        const COLORS = ['#9d5cff', '#14f195', '#00ffa3', '#c77dff', '#7f6cff'];
        let report = null;
        let selected = null;

        async function init() {
            try {
                const res = await fetch('/api/report');
                if (res.ok) {
                    report = await res.json();
                    render();
                } else {
                    showEmpty(await res.text());
                }
            } catch (err) {
                console.error('Failed to load report:', err);
            }
            connectWebSocket();
        }

        function connectWebSocket() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            const ws = new WebSocket(`${protocol}//${window.location.host}/ws`);

            ws.onopen = () => {
                document.getElementById('statusDot').classList.remove('disconnected');
                document.getElementById('statusText').textContent = 'Live';
            };

            ws.onclose = () => {
                document.getElementById('statusDot').classList.add('disconnected');
                document.getElementById('statusText').textContent = 'Disconnected';
                setTimeout(connectWebSocket, 2000);
            };

            ws.onmessage = (event) => {
                try {
                    report = JSON.parse(event.data);
                    render();
                } catch (err) {
                    console.error('Failed to parse update:', err);
                }
            };
        }

        function showEmpty(message) {
            document.getElementById('content').innerHTML =
                `<div class="empty-state"><h2>${message}</h2></div>`;
        }

        function render() {
            if (!report || report.snapshots.length === 0) {
                showEmpty('No Solana DeFi protocol data could be loaded.');
                return;
            }
            if (!selected || !report.snapshots.some(s => s.slug === selected)) {
                selected = report.snapshots[0].slug;
            }

            const ov = report.overview;
            let html = `
                <div class="metrics">
                    <div class="metric"><div class="metric-label">Protocols Analyzed</div><div class="metric-value">${ov.protocols_analyzed}</div></div>
                    <div class="metric"><div class="metric-label">Top TVL Protocol</div><div class="metric-value">${ov.top_protocol || '-'}</div></div>
                    <div class="metric"><div class="metric-label">Average TVL ($)</div><div class="metric-value">${formatUsd(ov.average_tvl)}</div></div>
                </div>

                <div class="card">
                    <h2>Total Value Locked (TVL) Across Solana DeFi</h2>
                    ${barChart(report.snapshots.map(s => ({ label: s.name, value: s.tvl })), formatUsd)}
                </div>

                <div class="card">
                    <h2>Protocol Adoption Over Time</h2>
                    <select id="protocolSelect" onchange="selectProtocol(this.value)">
                        ${report.snapshots.map(s => `<option value="${s.slug}" ${s.slug === selected ? 'selected' : ''}>${s.name}</option>`).join('')}
                    </select>
                    <div id="history"></div>
                </div>

                <div class="card">
                    <h2>Adoption Quality Score (AQS)</h2>
                    ${rankingTable(report.ranking)}
                    ${report.ranking.length > 0 ? barChart(report.ranking.map(r => ({ label: r.protocol, value: r.adoption_quality_score })), v => v.toFixed(3)) : ''}
                    ${report.unranked.length > 0 ? `<p class="caption">Unranked (insufficient or undefined history): ${report.unranked.join(', ')}</p>` : ''}
                </div>

                <div class="card">
                    <h2>How to Interpret This Dashboard</h2>
                    <ul>
                        <li><b>High AQS</b> &rarr; Sustainable adoption and sticky capital</li>
                        <li><b>High growth + high volatility</b> &rarr; Speculative inflows</li>
                        <li><b>Low volatility + steady growth</b> &rarr; Mature protocol usage</li>
                    </ul>
                </div>

                <p class="caption">Data Source: DefiLlama | Framework: Growth-Stability Adoption Model</p>
            `;

            document.getElementById('content').innerHTML = html;
            loadHistory(selected);
        }

        function selectProtocol(slug) {
            selected = slug;
            loadHistory(slug);
        }

        async function loadHistory(slug) {
            const el = document.getElementById('history');
            try {
                const res = await fetch(`/api/protocols/${slug}/history`);
                if (!res.ok) {
                    el.innerHTML = `<p class="caption">${await res.text()}</p>`;
                    return;
                }
                const data = await res.json();
                const name = data.protocol.name;
                el.innerHTML = `
                    <p class="caption">${name} &mdash; TVL Trend</p>
                    ${lineChart(data.points.map(p => [p.date, p.tvl]), '#14f195', formatUsd)}
                    <p class="caption">${name} &mdash; TVL Volatility (${data.window}-Day)</p>
                    ${lineChart(data.points.filter(p => p.rolling_volatility !== null).map(p => [p.date, p.rolling_volatility]), '#9d5cff', v => v.toFixed(4))}
                `;
            } catch (err) {
                console.error('Failed to load history:', err);
            }
        }

        function barChart(rows, fmt) {
            const w = 900, h = 260, pad = 40;
            const max = Math.max(...rows.map(r => r.value), 0) || 1;
            const bw = (w - pad * 2) / rows.length;
            const bars = rows.map((r, i) => {
                const bh = Math.max(0, r.value) / max * (h - pad * 2);
                const x = pad + i * bw + bw * 0.15;
                const y = h - pad - bh;
                return `<rect x="${x}" y="${y}" width="${bw * 0.7}" height="${bh}" rx="4" fill="${COLORS[i % COLORS.length]}"></rect>
                        <text x="${x + bw * 0.35}" y="${y - 6}" text-anchor="middle">${fmt(r.value)}</text>
                        <text x="${x + bw * 0.35}" y="${h - pad + 16}" text-anchor="middle">${r.label}</text>`;
            }).join('');
            return `<svg viewBox="0 0 ${w} ${h}" width="100%">${bars}</svg>`;
        }

        function lineChart(points, color, fmt) {
            if (points.length < 2) return '<p class="caption">Not enough data.</p>';
            const w = 900, h = 240, pad = 50;
            const xs = points.map(p => p[0]), ys = points.map(p => p[1]);
            const x0 = Math.min(...xs), x1 = Math.max(...xs);
            const y0 = Math.min(...ys), y1 = Math.max(...ys);
            const sx = x => pad + (x - x0) / ((x1 - x0) || 1) * (w - pad * 2);
            const sy = y => h - pad - (y - y0) / ((y1 - y0) || 1) * (h - pad * 2);
            const path = points.map(p => `${sx(p[0]).toFixed(1)},${sy(p[1]).toFixed(1)}`).join(' ');
            const day = t => new Date(t * 1000).toISOString().slice(0, 10);
            return `<svg viewBox="0 0 ${w} ${h}" width="100%">
                <polyline points="${path}" fill="none" stroke="${color}" stroke-width="2"></polyline>
                <text x="${pad}" y="${h - 10}">${day(x0)}</text>
                <text x="${w - pad}" y="${h - 10}" text-anchor="end">${day(x1)}</text>
                <text x="4" y="${sy(y1) + 4}">${fmt(y1)}</text>
                <text x="4" y="${sy(y0) + 4}">${fmt(y0)}</text>
            </svg>`;
        }

        function rankingTable(ranking) {
            if (ranking.length === 0) return '<p class="caption">Not enough history to score any protocol.</p>';
            return `<table>
                <tr><th>Protocol</th><th>Growth Rate</th><th>Volatility</th><th>AQS</th></tr>
                ${ranking.map(r => `<tr>
                    <td>${r.protocol}</td>
                    <td>${(r.growth_rate * 100).toFixed(2)}%</td>
                    <td>${r.volatility.toFixed(5)}</td>
                    <td>${r.adoption_quality_score.toFixed(3)}</td>
                </tr>`).join('')}
            </table>`;
        }

        function formatUsd(value) {
            return Math.round(value).toLocaleString('en-US');
        }

        init();
    </script>
</body>
</html>
"##;
