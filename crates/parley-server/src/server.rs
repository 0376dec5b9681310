//! `ParleyServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parley_core::ConnId;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::{ChatHub, ChatPolicy};
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::HealthResponse;
use crate::metrics::WS_CONNECTIONS_REFUSED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connections::ConnectionHub;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Chat core.
    pub chat: Arc<ChatHub>,
    /// Open sockets.
    pub connections: Arc<ConnectionHub>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// The Parley chat server.
pub struct ParleyServer {
    config: Arc<ServerConfig>,
    chat: Arc<ChatHub>,
    connections: Arc<ConnectionHub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: Option<PrometheusHandle>,
}

impl ParleyServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, policy: &ChatPolicy) -> Self {
        let connections = Arc::new(ConnectionHub::new());
        Self {
            config: Arc::new(config),
            chat: Arc::new(ChatHub::new(connections.clone(), policy)),
            connections,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics_handle: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            chat: self.chat.clone(),
            connections: self.connections.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// The task ends once the shutdown token is cancelled and in-flight
    /// HTTP requests have completed.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let bind_err = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(%local_addr, "parley server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
            info!("listener stopped");
        });
        Ok((local_addr, handle))
    }

    /// Cancel every session and the listener, then wait up to `timeout` for
    /// them to finish.
    pub async fn stop(&self, listener: JoinHandle<()>, timeout: Duration) {
        self.shutdown.graceful_shutdown(vec![listener], Some(timeout)).await;

        let connections = self.connections.clone();
        let drained = tokio::time::timeout(timeout, async move {
            while connections.count() > 0 {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = self.connections.count(), "sockets still open after shutdown timeout");
        }
    }

    /// The chat core.
    pub fn chat(&self) -> &Arc<ChatHub> {
        &self.chat
    }

    /// Open sockets.
    pub fn connections(&self) -> &Arc<ConnectionHub> {
        &self.connections
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /ws
async fn ws_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let open = state.connections.count();
    if open >= state.config.max_connections {
        counter!(WS_CONNECTIONS_REFUSED_TOTAL).increment(1);
        warn!(open, max = state.config.max_connections, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let conn_id = ConnId::new();
    let cancel = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                conn_id,
                state.chat,
                state.connections,
                state.config,
                cancel,
            )
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::collect(
        state.start_time,
        &state.connections,
        state.chat.registry(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
