//! # parley-server
//!
//! Broadcast chat over WebSockets.
//!
//! - Chat core: session registry, event router, broadcast dispatcher,
//!   sequenced behind [`ChatHub`](chat::ChatHub)
//! - `WebSocket` transport: per-socket queues, heartbeat, session loop
//! - HTTP endpoints: `/ws`, `/health`, `/metrics`
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod chat;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use chat::{ChatHub, ChatPolicy};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::ParleyServer;
