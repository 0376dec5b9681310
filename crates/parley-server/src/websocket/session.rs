//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parley_core::{ConnId, InboundEvent, ServerEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::connections::ConnectionHub;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::chat::ChatHub;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer gets to flush and close after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    ClientDisconnect,
    TransportError,
    HeartbeatTimeout,
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Attaches the connection and routes `Connect` in one sequenced step
/// 2. Decodes inbound text frames and hands them to the [`ChatHub`]
/// 3. Forwards queued frames to the socket and pings every heartbeat interval
/// 4. Closes on client close, `disconnect` event, heartbeat timeout or shutdown
/// 5. Detaches, closes the queue and routes `Disconnect`
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnId,
    chat: Arc<ChatHub>,
    connections: Arc<ConnectionHub>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let _ = chat.open(&conn_id, || connections.attach(connection.clone()));

    let ping_every = config.heartbeat_interval();
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_every);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(text) = frame else {
                        // every sender dropped: the session is over
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    };
                    if ws_tx.send(Message::Text(Utf8Bytes::from(&*text))).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reason = {
        let heartbeat = run_heartbeat(
            connection.clone(),
            config.heartbeat_interval(),
            config.heartbeat_timeout(),
            shutdown.child_token(),
        );
        tokio::pin!(heartbeat);

        loop {
            let msg = tokio::select! {
                result = &mut heartbeat => break match result {
                    HeartbeatResult::TimedOut => CloseReason::HeartbeatTimeout,
                    HeartbeatResult::Cancelled => CloseReason::Shutdown,
                },
                msg = ws_rx.next() => msg,
            };
            let Some(Ok(msg)) = msg else {
                break CloseReason::TransportError;
            };
            connection.mark_alive();

            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Binary(data) => {
                    if let Ok(s) = std::str::from_utf8(&data) {
                        s.to_owned()
                    } else {
                        info!(len = data.len(), "ignoring non-UTF8 binary frame");
                        continue;
                    }
                }
                Message::Close(_) => break CloseReason::ClientClosed,
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            match InboundEvent::decode(&text) {
                Ok(InboundEvent::Connect) => debug!("ignoring client connect event"),
                Ok(InboundEvent::Disconnect) => break CloseReason::ClientDisconnect,
                Ok(event) => {
                    let _ = chat.handle(&conn_id, event);
                }
                Err(e) => {
                    warn!(error = %e, len = text.len(), "undecodable frame");
                    let _ = chat.notify(&conn_id, ServerEvent::error(e.to_string()));
                }
            }
        }
    };

    match reason {
        CloseReason::HeartbeatTimeout => {
            warn!(
                timeout_secs = config.heartbeat_timeout_secs,
                idle_ms = connection.last_pong_elapsed().as_millis(),
                "client unresponsive, closing"
            );
        }
        CloseReason::Shutdown => info!("server shutting down, closing"),
        CloseReason::TransportError => debug!("socket stream ended"),
        CloseReason::ClientClosed | CloseReason::ClientDisconnect => {
            debug!(?reason, "client closed session");
        }
    }

    // Detach first so no broadcast reaches a dying socket, then drop the last
    // sender so the writer sends Close, then let the others know.
    let _ = connections.detach(&conn_id);
    let age = connection.age();
    let dropped = connection.drop_count();
    drop(connection);
    let _ = chat.handle(&conn_id, InboundEvent::Disconnect);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    if dropped > 0 {
        warn!(dropped, "frames were dropped for this client");
    }
    info!(duration_secs = age.as_secs(), dropped, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
}
