//! Per-socket connection state shared between the reader, the writer task
//! and the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use parley_core::ConnId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::chat::DeliveryError;

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Transport-assigned id.
    pub id: ConnId,
    /// Queue drained by the socket's writer task.
    tx: mpsc::Sender<Arc<str>>,
    connected_at: Instant,
    /// Set by any inbound activity, cleared by the heartbeat.
    pub is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection writing into `tx`.
    pub fn new(id: ConnId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text frame without waiting.
    pub fn send(&self, frame: Arc<str>) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            }
        })
    }

    /// Frames that could not be queued, reported when the session ends.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity (pong, ping or data).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last recorded activity. Logged on heartbeat timeout.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age, recorded as the session duration.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
