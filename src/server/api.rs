use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::ws::rejection::WebSocketUpgradeRejection,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use colored::*;
use futures::{SinkExt, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::shard::{Shard, ShardSet, ShardStats};
use crate::storage::{Database, FlagStore};

pub const BANNER: &str = "Horus Gun Server - Connect via /gun WebSocket";
pub const ALIVE: &str = "Gun server running - use WebSocket connection";

#[derive(Clone)]
pub struct AppState {
    pub shards: Arc<ShardSet>,
}

pub async fn serve(config: HubConfig) -> Result<()> {
    let db = Database::new(&config.data_dir)?;
    db.initialize()?;
    let state = prepare(&config, Arc::new(db)).await?;

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    println!(
        "{} Server running at {}",
        "✓".green(),
        format!("http://{}", addr).bright_blue()
    );

    serve_listener(listener, state).await
}

/// Build every configured shard and run its seeding.
pub async fn prepare(config: &HubConfig, flags: Arc<dyn FlagStore>) -> Result<AppState> {
    let shards = config.build_shards(flags)?;
    shards.activate_all().await?;
    for shard in shards.iter() {
        info!(shard = shard.name(), nodes = shard.store().len(), "shard ready");
    }
    Ok(AppState {
        shards: Arc::new(shards),
    })
}

pub async fn serve_listener(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/health", get(|| async { Json("OK") }))
        .route("/status", get(status))
        .route("/gun", get(default_gun))
        .route("/gun/{shard}", get(shard_gun))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<Vec<ShardStats>> {
    let mut stats = Vec::with_capacity(state.shards.len());
    for shard in state.shards.iter() {
        stats.push(shard.stats().await);
    }
    Json(stats)
}

async fn default_gun(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match state.shards.default_shard() {
        Some(shard) => gun_endpoint(Arc::clone(shard), &headers, ws),
        None => (StatusCode::NOT_FOUND, "no default shard").into_response(),
    }
}

async fn shard_gun(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match state.shards.get(&name) {
        Some(shard) => gun_endpoint(Arc::clone(shard), &headers, ws),
        None => (StatusCode::NOT_FOUND, format!("unknown shard {name}")).into_response(),
    }
}

fn gun_endpoint(
    shard: Arc<Shard>,
    headers: &HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            let name = shard.name().to_string();
            ws.on_failed_upgrade(move |err| warn!(shard = %name, error = %err, "websocket upgrade failed"))
                .on_upgrade(move |socket| handle_ws(shard, socket))
        }
        Err(rejection) if wants_upgrade(headers) => {
            warn!(shard = shard.name(), error = %rejection, "rejecting websocket upgrade");
            (
                rejection.status(),
                format!("WebSocket upgrade failed: {}", rejection.body_text()),
            )
                .into_response()
        }
        Err(_) => (StatusCode::OK, ALIVE).into_response(),
    }
}

fn wants_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn handle_ws(shard: Arc<Shard>, socket: WebSocket) {
    let hub = Arc::clone(shard.hub());
    let (id, mut outgoing) = hub.register();
    let (mut sender, mut receiver) = socket.split();

    // Drain this connection's queue onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(text) = outgoing.recv().await {
            if sender.send(Message::Text(text.to_string().into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Frames from one connection are applied strictly in arrival order
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                hub.handle_text(id, text.as_str());
            }
            Ok(Message::Binary(bin)) => {
                hub.handle_bytes(id, &bin);
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                debug!(shard = shard.name(), connection = %id, error = %err, "socket error");
                break;
            }
        }
    }

    hub.mark_closing(id);
    hub.unregister(id);
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFlags;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = prepare(&HubConfig::default(), Arc::new(MemoryFlags::new()))
            .await
            .unwrap();
        router(state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_liveness_routes() {
        let response = app()
            .await
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, BANNER);

        let response = app()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "\"OK\"");
    }

    #[tokio::test]
    async fn test_gun_without_upgrade_reports_alive() {
        for path in ["/gun", "/gun/platform"] {
            let response = app()
                .await
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, ALIVE);
        }
    }

    #[tokio::test]
    async fn test_unknown_shard() {
        let response = app()
            .await
            .oneshot(Request::get("/gun/billing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_broken_upgrade_is_rejected() {
        // Asks for websocket but omits the handshake key and version
        let request = Request::get("/gun")
            .header(header::UPGRADE, "websocket")
            .header(header::CONNECTION, "upgrade")
            .body(Body::empty())
            .unwrap();
        let response = app().await.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error() || response.status().is_server_error());
        assert!(body_text(response).await.starts_with("WebSocket upgrade failed"));
    }

    #[tokio::test]
    async fn test_status_reports_seeded_shards() {
        let response = app()
            .await
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let stats = stats.as_array().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["name"], "admin");
        assert_eq!(stats[0]["nodes"], 2);
        assert_eq!(stats[0]["connections"], 0);
        assert_eq!(stats[0]["initialized"], true);
    }
}
