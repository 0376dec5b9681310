//! # parley
//!
//! Parley server binary: loads settings, starts the HTTP/WebSocket server
//! and waits for a shutdown signal.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parley_server::shutdown::{self, DEFAULT_SHUTDOWN_TIMEOUT};
use parley_server::{ChatPolicy, ParleyServer, ServerConfig};
use parley_settings::ParleySettings;

/// Parley broadcast chat server.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Parley broadcast chat server")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    /// Apply flags over loaded settings. Flags win over file and env.
    fn apply(&self, settings: &mut ParleySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(max) = self.max_connections {
            settings.server.max_connections = max;
        }
    }

    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(parley_settings::settings_path)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings_path();
    let mut settings = parley_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    parley_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics_handle =
        parley_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let server = ParleyServer::new(
        ServerConfig::from(&settings.server),
        &ChatPolicy::from(&settings.chat),
    )
    .with_metrics(metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(
        %addr,
        unique_nicknames = settings.chat.unique_nicknames,
        max_connections = settings.server.max_connections,
        "parley ready"
    );

    shutdown::wait_for_signal().await;
    tracing::info!("shutting down");
    server.stop(handle, DEFAULT_SHUTDOWN_TIMEOUT).await;
    Ok(())
}
