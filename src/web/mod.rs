//! Web server module: axum HTTP + WebSocket signaling + camera preview.
//!
//! Routes:
//! - `GET /` — static UI (optional directory)
//! - `GET /ws` — signaling WebSocket, accepted unconditionally
//! - `GET /api/peers` — ids of connected peers
//! - `GET /api/status` — uptime + registry stats
//! - `GET /camera` — basic-auth-gated MJPEG preview stream

pub mod mjpeg;
pub mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::capture::CameraHandle;
use crate::server::{Registry, RegistryHandle};

pub use mjpeg::CameraCreds;

/// Shared state for the web server
pub(crate) struct WebState {
    pub(crate) registry: Registry,
    pub(crate) handle: RegistryHandle,
    pub(crate) camera: Option<CameraHandle>,
    pub(crate) camera_creds: Option<CameraCreds>,
    pub(crate) start_time: Instant,
}

/// Build the application router.
///
/// `ui_dir` — directory with static UI files (index.html + assets). If None,
/// only the API/WS/camera endpoints are served.
/// `camera` / `creds` — the preview frame source and its basic-auth
/// credentials; the `/camera` route is inert without both.
pub fn app(
    registry: Registry,
    camera: Option<CameraHandle>,
    creds: Option<CameraCreds>,
    ui_dir: Option<PathBuf>,
) -> Router {
    let handle = registry.handle();
    let state = Arc::new(WebState {
        registry,
        handle,
        camera,
        camera_creds: creds,
        start_time: Instant::now(),
    });

    let mut app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/peers", get(api_peers))
        .route("/api/status", get(api_status))
        .route("/camera", get(mjpeg::stream))
        .layer(CorsLayer::permissive())
        .with_state(state);

    if let Some(path) = ui_dir {
        if path.exists() {
            info!("Serving UI from {:?}", path);
            app = app.fallback_service(
                ServeDir::new(&path)
                    .append_index_html_on_directories(true),
            );
        } else {
            tracing::warn!("UI path {:?} does not exist, skipping static file serving", path);
        }
    }

    app
}

/// Bind and serve until the process exits.
pub async fn start(
    registry: Registry,
    bind: SocketAddr,
    ui_dir: Option<PathBuf>,
    camera: Option<CameraHandle>,
    creds: Option<CameraCreds>,
) -> Result<()> {
    let app = app(registry, camera, creds, ui_dir);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind to {}", bind))?;

    info!("Web server listening on http://{}", bind);

    axum::serve(listener, app)
        .await
        .context("Web server error")?;

    Ok(())
}

/// WebSocket upgrade handler
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WebState>>,
) -> impl IntoResponse {
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| ws::handle_ws(socket, registry))
}

/// GET /api/peers — ids of connected peers
async fn api_peers(State(state): State<Arc<WebState>>) -> Json<serde_json::Value> {
    let peers: Vec<String> = state
        .handle
        .peer_ids()
        .await
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(serde_json::json!({ "peers": peers }))
}

/// GET /api/status — server status
async fn api_status(State(state): State<Arc<WebState>>) -> Json<serde_json::Value> {
    let stats = state.handle.stats();
    let uptime = state.start_time.elapsed().as_secs();

    Json(serde_json::json!({
        "peers": stats.peers_connected,
        "uptime_secs": uptime,
        "envelopes_routed": stats.envelopes_routed,
        "envelopes_broadcast": stats.envelopes_broadcast,
        "envelopes_dropped": stats.envelopes_dropped,
        "camera": state.camera.is_some(),
    }))
}
