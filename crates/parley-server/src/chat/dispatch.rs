//! Broadcast dispatcher: resolves an [`Audience`] against the open
//! connections and hands each recipient the encoded frame.

use std::sync::Arc;

use metrics::counter;
use parley_core::ConnId;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::router::{Audience, Emission};
use crate::metrics::CHAT_DELIVERIES_FAILED_TOTAL;

/// Why a frame could not be handed to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The connection is not (or no longer) attached.
    #[error("unknown connection")]
    UnknownConnection,
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,
    /// The connection's outbound queue is full.
    #[error("send queue full")]
    Full,
}

/// The set of open connections and a way to reach each of them.
pub trait Transport: Send + Sync {
    /// Ids of every currently open connection.
    fn open_connections(&self) -> Vec<ConnId>;

    /// Queue `frame` for `conn` without blocking.
    fn deliver(&self, conn: &ConnId, frame: Arc<str>) -> Result<(), DeliveryError>;
}

/// Per-emission delivery tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Recipients whose queue accepted the frame.
    pub delivered: usize,
    /// Recipients that could not be reached.
    pub failed: usize,
}

impl DispatchReport {
    /// Add another report's counts to this one.
    pub fn merge(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Fans emissions out over a [`Transport`].
pub struct BroadcastDispatcher {
    transport: Arc<dyn Transport>,
}

impl BroadcastDispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Recipients of `audience` for an event caused by `sender`.
    pub fn resolve(&self, sender: &ConnId, audience: Audience) -> Vec<ConnId> {
        let open = self.transport.open_connections().into_iter();
        match audience {
            Audience::SenderOnly => open.filter(|c| c == sender).collect(),
            Audience::AllExceptSender => open.filter(|c| c != sender).collect(),
            Audience::All => open.collect(),
        }
    }

    /// Deliver one emission. Failures are logged and skipped.
    pub fn dispatch(&self, sender: &ConnId, emission: &Emission) -> DispatchReport {
        let event_name = emission.event.name();
        let frame: Arc<str> = match emission.event.encode() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(event = event_name, error = %e, "failed to encode event");
                return DispatchReport::default();
            }
        };

        let recipients = self.resolve(sender, emission.audience);
        debug!(
            event = event_name,
            audience = ?emission.audience,
            recipients = recipients.len(),
            "dispatching event"
        );

        let mut report = DispatchReport::default();
        for conn in &recipients {
            match self.transport.deliver(conn, frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!(CHAT_DELIVERIES_FAILED_TOTAL).increment(1);
                    warn!(conn_id = %conn, event = event_name, error = %e, "failed to deliver event");
                }
            }
        }
        report
    }
}
