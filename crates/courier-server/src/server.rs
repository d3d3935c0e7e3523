use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use courier_core::ConnId;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::client::{self, ClientHub};
use crate::handlers::{self, HandlerState};
use crate::registry::SessionRegistry;

/// Server configuration.
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            max_send_queue: 256,
            heartbeat_interval: client::DEFAULT_HEARTBEAT_INTERVAL,
            client_timeout: client::DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler_state: Arc<HandlerState>,
    pub inbound_tx: mpsc::Sender<(ConnId, String)>,
    heartbeat_interval: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the background
/// tasks alive and reports the actually-bound port (port 0 supported).
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let hub = Arc::new(ClientHub::new(config.max_send_queue, config.client_timeout));
    let registry = Arc::new(SessionRegistry::new());
    let handler_state = Arc::new(HandlerState::new(hub, registry));

    // All inbound frames funnel through one dispatch task, so every registry
    // mutation is driven from a single place.
    let (inbound_tx, inbound_rx) = mpsc::channel::<(ConnId, String)>(1024);
    let dispatcher = tokio::spawn(process_inbound(inbound_rx, Arc::clone(&handler_state)));

    // Heartbeat sweep for clients that vanished without a clean close
    let sweeper = start_sweep_task(Arc::clone(&handler_state), Duration::from_secs(60));

    let app_state = AppState {
        handler_state: Arc::clone(&handler_state),
        inbound_tx,
        heartbeat_interval: config.heartbeat_interval,
    };
    let router = build_router(app_state);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "Relay server started");

    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _dispatcher: dispatcher,
        _sweeper: sweeper,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _dispatcher: tokio::task::JoinHandle<()>,
    _sweeper: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Full lifecycle of one connection: hub registration, session registration,
/// socket pump, then the disconnect path. The disconnect handler is
/// idempotent, so racing a heartbeat eviction or hard error is harmless.
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (conn_id, rx) = state.handler_state.hub.register();
    handlers::handle_connect(&state.handler_state, &conn_id, &addr.to_string());

    client::handle_ws_connection(
        socket,
        conn_id.clone(),
        rx,
        Arc::clone(&state.handler_state.hub),
        state.inbound_tx.clone(),
        state.heartbeat_interval,
    )
    .await;

    handlers::handle_disconnect(&state.handler_state, &conn_id);
}

/// Minimal operator status page.
async fn status_page(State(state): State<AppState>) -> Html<String> {
    let s = &state.handler_state;
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Courier Relay</title></head>\n<body>\n\
         <h1>Courier Relay</h1>\n<p>Server is running.</p>\n\
         <p>Connected clients: {}</p>\n<p>Identified users: {}</p>\n\
         <p>WebSocket endpoint: <code>/ws</code></p>\n</body>\n</html>\n",
        s.hub.count(),
        s.registry.identified_count(),
    ))
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let s = &state.handler_state;
    axum::Json(serde_json::json!({
        "status": "ok",
        "connections": s.hub.count(),
        "identified": s.registry.identified_count(),
    }))
}

/// Process inbound frames from all WebSocket clients.
async fn process_inbound(mut rx: mpsc::Receiver<(ConnId, String)>, state: Arc<HandlerState>) {
    while let Some((conn_id, raw)) = rx.recv().await {
        handlers::dispatch(&state, &conn_id, &raw);
    }
}

/// Periodically evict clients that stopped answering protocol pings,
/// through the same path as a clean disconnect.
fn start_sweep_task(state: Arc<HandlerState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume first immediate tick
        loop {
            ticker.tick().await;
            let dead = state.hub.dead_clients();
            for conn_id in dead {
                tracing::info!(conn_id = %conn_id, "Evicting unresponsive client");
                state.hub.unregister(&conn_id);
                handlers::handle_disconnect(&state, &conn_id);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_CLIENT_TIMEOUT;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0, // random port
            ..Default::default()
        }
    }

    #[test]
    fn config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_send_queue, 256);
        assert!(config.heartbeat_interval < config.client_timeout);
    }

    #[test]
    fn build_router_creates_routes() {
        let hub = Arc::new(ClientHub::new(32, DEFAULT_CLIENT_TIMEOUT));
        let registry = Arc::new(SessionRegistry::new());
        let handler_state = Arc::new(HandlerState::new(hub, registry));
        let (inbound_tx, _) = mpsc::channel(32);

        let state = AppState {
            handler_state,
            inbound_tx,
            heartbeat_interval: client::DEFAULT_HEARTBEAT_INTERVAL,
        };

        let _router = build_router(state);
        // If this doesn't panic, the router was built successfully
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = start(test_config()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["identified"], 0);
    }

    #[tokio::test]
    async fn server_serves_status_page() {
        let handle = start(test_config()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body = resp.text().await.unwrap();
        assert!(body.contains("Courier Relay"));
        assert!(body.contains("Connected clients: 0"));
    }
}
