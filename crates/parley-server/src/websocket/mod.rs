//! WebSocket transport: per-socket state, the open-connection set, heartbeat
//! and the session loop.

pub mod connection;
pub mod connections;
pub mod heartbeat;
pub mod session;
