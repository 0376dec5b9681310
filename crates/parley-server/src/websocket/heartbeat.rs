//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No activity from the client within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's alive flag.
///
/// At each `interval` tick the flag is read and cleared. After
/// `timeout / interval` consecutive ticks (at least one) without activity,
/// returns [`HeartbeatResult::TimedOut`]. Pings themselves are sent by the
/// socket's writer task.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    // first tick fires immediately
    let _ = check_interval.tick().await;

    let interval_ms = interval.as_millis().max(1);
    let max_missed = u32::try_from((timeout.as_millis() / interval_ms).max(1)).unwrap_or(u32::MAX);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ConnId;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    fn make_connection() -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ClientConnection::new(ConnId::from("hb_conn"), tx))
    }

    #[tokio::test]
    async fn cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_heartbeat(
            make_connection(),
            Duration::from_secs(100),
            Duration::from_secs(300),
            cancel,
        )
        .await;
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_times_out() {
        let conn = make_connection();
        conn.is_alive.store(false, Ordering::Relaxed);
        let result = run_heartbeat(
            conn,
            Duration::from_millis(100),
            Duration::from_millis(300),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_needs_consecutive_misses() {
        let conn = make_connection();
        conn.is_alive.store(false, Ordering::Relaxed);
        let start = time::Instant::now();
        let _ = run_heartbeat(
            conn,
            Duration::from_millis(100),
            Duration::from_millis(300),
            CancellationToken::new(),
        )
        .await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn active_connection_stays_alive() {
        let conn = make_connection();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            conn.clone(),
            Duration::from_millis(100),
            Duration::from_millis(200),
            cancel.clone(),
        ));

        for _ in 0..10 {
            time::sleep(Duration::from_millis(50)).await;
            conn.mark_alive();
        }
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }
}
