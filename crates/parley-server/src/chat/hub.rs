//! `ChatHub`: the single entry point the transport calls for every inbound
//! event.
//!
//! Routing and dispatch of one event happen under a sequencing lock, so
//! every client observes emissions in the same global order. Delivery is a
//! non-blocking enqueue, so the lock is never held across an await.

use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use parley_core::{ConnId, InboundEvent, ServerEvent};
use tracing::debug;

use super::ChatPolicy;
use super::dispatch::{BroadcastDispatcher, DispatchReport, Transport};
use super::registry::SessionRegistry;
use super::router::{Audience, Emission, EventRouter};
use crate::metrics::{CHAT_MESSAGES_TOTAL, CHAT_SESSIONS_ACTIVE};

/// Registry, router and dispatcher wired together.
pub struct ChatHub {
    registry: Arc<SessionRegistry>,
    router: EventRouter,
    dispatcher: BroadcastDispatcher,
    sequencer: Mutex<()>,
}

impl ChatHub {
    /// Create a hub delivering through `transport`.
    pub fn new(transport: Arc<dyn Transport>, policy: &ChatPolicy) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            policy.unique_nicknames,
            policy.max_nickname_len,
        ));
        Self {
            router: EventRouter::new(registry.clone(), policy.max_message_len),
            dispatcher: BroadcastDispatcher::new(transport),
            registry,
            sequencer: Mutex::new(()),
        }
    }

    /// Make `conn` reachable via `attach` and route `Connect`, as one
    /// sequenced step. No broadcast can land between the two, so the
    /// newcomer's first frame is always `request_nickname`.
    pub fn open(&self, conn: &ConnId, attach: impl FnOnce()) -> DispatchReport {
        let _seq = self.sequencer.lock();
        attach();
        self.route_and_dispatch(conn, InboundEvent::Connect)
    }

    /// Route `event` from `conn` and deliver the resulting emissions in order.
    pub fn handle(&self, conn: &ConnId, event: InboundEvent) -> DispatchReport {
        let _seq = self.sequencer.lock();
        self.route_and_dispatch(conn, event)
    }

    fn route_and_dispatch(&self, conn: &ConnId, event: InboundEvent) -> DispatchReport {
        let event_name = event.name();
        let emissions = self.router.route(conn, event);
        debug!(conn_id = %conn, event = event_name, emissions = emissions.len(), "routed event");

        let mut report = DispatchReport::default();
        for emission in &emissions {
            if matches!(emission.event, ServerEvent::NewMessage { .. }) {
                counter!(CHAT_MESSAGES_TOTAL).increment(1);
            }
            report.merge(self.dispatcher.dispatch(conn, emission));
        }
        #[allow(clippy::cast_precision_loss)]
        gauge!(CHAT_SESSIONS_ACTIVE).set(self.registry.len() as f64);
        report
    }

    /// Send `event` to `conn` alone, outside of routing.
    pub fn notify(&self, conn: &ConnId, event: ServerEvent) -> DispatchReport {
        let _seq = self.sequencer.lock();
        self.dispatcher.dispatch(
            conn,
            &Emission {
                audience: Audience::SenderOnly,
                event,
            },
        )
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
