//! # parley-core
//!
//! Shared vocabulary for the Parley chat service:
//!
//! - **Connection IDs**: [`ConnId`], the opaque per-socket token
//! - **Wire protocol**: [`InboundEvent`] (client → server) and
//!   [`ServerEvent`] (server → client) JSON frames
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod protocol;

pub use ids::ConnId;
pub use protocol::{FrameError, InboundEvent, SendMessagePayload, ServerEvent};
