//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

use crate::chat::SessionRegistry;
use crate::websocket::connections::ConnectionHub;

/// Liveness report: open sockets versus registered participants.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the server is accepting connections.
    pub status: &'static str,
    /// Whole seconds since the server started.
    pub uptime_secs: u64,
    /// Attached WebSocket connections, registered or not.
    pub connections: usize,
    /// Connections holding a nickname.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Read the live counts from the connection hub and the registry.
    pub fn collect(started: Instant, sockets: &ConnectionHub, registry: &SessionRegistry) -> Self {
        Self {
            status: "ok",
            uptime_secs: started.elapsed().as_secs(),
            connections: sockets.count(),
            active_sessions: registry.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ConnId;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::websocket::connection::ClientConnection;

    fn attach(hub: &ConnectionHub, id: &str) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(1);
        hub.attach(Arc::new(ClientConnection::new(ConnId::from(id), tx)));
        rx
    }

    #[test]
    fn lurkers_count_as_connections_not_sessions() {
        let sockets = ConnectionHub::new();
        let registry = SessionRegistry::new(false, 32);
        let _rx1 = attach(&sockets, "c1");
        let _rx2 = attach(&sockets, "c2");
        let _ = registry.register(&ConnId::from("c1"), "alice").unwrap();

        let health = HealthResponse::collect(Instant::now(), &sockets, &registry);
        assert_eq!(health.status, "ok");
        assert_eq!(health.connections, 2);
        assert_eq!(health.active_sessions, 1);
        assert!(health.uptime_secs < 2);
    }

    #[test]
    fn uptime_counts_from_start() {
        let started = Instant::now().checked_sub(Duration::from_secs(90)).unwrap();
        let health =
            HealthResponse::collect(started, &ConnectionHub::new(), &SessionRegistry::new(false, 32));
        assert!(health.uptime_secs >= 89);
        assert_eq!(health.connections, 0);
    }

    #[test]
    fn wire_shape() {
        let health = HealthResponse::collect(
            Instant::now(),
            &ConnectionHub::new(),
            &SessionRegistry::new(false, 32),
        );
        let v = serde_json::to_value(&health).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["connections"], 0);
        assert_eq!(v["active_sessions"], 0);
        assert!(v["uptime_secs"].is_u64());
    }
}
