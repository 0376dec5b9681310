//! The set of open sockets, indexed by connection id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parley_core::ConnId;
use tracing::debug;

use super::connection::ClientConnection;
use crate::chat::{DeliveryError, Transport};

/// Open connections. Implements [`Transport`] for the chat core.
#[derive(Default)]
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnId, Arc<ClientConnection>>>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn attach(&self, connection: Arc<ClientConnection>) {
        let id = connection.id.clone();
        let mut conns = self.connections.write();
        let _ = conns.insert(id.clone(), connection);
        debug!(conn_id = %id, connections = conns.len(), "connection attached");
    }

    /// Remove a connection. A second call for the same id returns `None`.
    pub fn detach(&self, id: &ConnId) -> Option<Arc<ClientConnection>> {
        let mut conns = self.connections.write();
        let removed = conns.remove(id);
        if removed.is_some() {
            debug!(conn_id = %id, connections = conns.len(), "connection detached");
        }
        removed
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.connections.read().len()
    }
}

impl Transport for ConnectionHub {
    fn open_connections(&self) -> Vec<ConnId> {
        self.connections.read().keys().cloned().collect()
    }

    fn deliver(&self, conn: &ConnId, frame: Arc<str>) -> Result<(), DeliveryError> {
        // clone out so the map lock is not held during the send
        let connection = self.get(conn).ok_or(DeliveryError::UnknownConnection)?;
        connection.send(frame)
    }
}
