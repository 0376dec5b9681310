//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle used to render `/metrics`. Call once, before any
/// metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection cap (counter).
pub const WS_CONNECTIONS_REFUSED_TOTAL: &str = "ws_connections_refused_total";
/// Socket lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Chat messages broadcast (counter).
pub const CHAT_MESSAGES_TOTAL: &str = "chat_messages_total";
/// Per-recipient delivery failures (counter).
pub const CHAT_DELIVERIES_FAILED_TOTAL: &str = "chat_deliveries_failed_total";
/// Registered nicknames (gauge).
pub const CHAT_SESSIONS_ACTIVE: &str = "chat_sessions_active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        // build without installing globally
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(CHAT_MESSAGES_TOTAL).increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("chat_messages_total 2"), "{output}");
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTIONS_REFUSED_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            CHAT_MESSAGES_TOTAL,
            CHAT_DELIVERIES_FAILED_TOTAL,
            CHAT_SESSIONS_ACTIVE,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
