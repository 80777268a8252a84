//! # aviso
//!
//! Server binary: loads settings, installs logging and metrics, then serves
//! the WebSocket endpoint and the notification scheduler until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use aviso_server::config::{NotificationConfig, ServerConfig};
use aviso_server::server::AvisoServer;
use aviso_settings::AvisoSettings;
use clap::Parser;

/// aviso notification server.
#[derive(Parser, Debug)]
#[command(name = "aviso", about = "WebSocket command server with periodic notifications")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.aviso/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Seconds between notifications (overrides settings).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    notify_interval_secs: Option<u64>,

    /// Do not start the notification scheduler.
    #[arg(long)]
    no_notifications: bool,
}

/// Merge CLI flags over loaded settings.
fn server_config(settings: &AvisoSettings, cli: &Cli) -> ServerConfig {
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| settings.server.host.clone()),
        port: cli.port.unwrap_or(settings.server.port),
        max_message_size: settings.server.max_message_bytes,
        send_timeout_ms: settings.server.send_timeout_ms,
        notifications: NotificationConfig {
            enabled: settings.notifications.enabled && !cli.no_notifications,
            interval_secs: cli
                .notify_interval_secs
                .unwrap_or(settings.notifications.interval_secs),
            message: settings.notifications.message.clone(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: the log level comes from them.
    let loaded = match &cli.settings {
        Some(path) => aviso_settings::load_settings_from_path(path),
        None => aviso_settings::load_settings(),
    };
    let (settings, settings_error) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (AvisoSettings::default(), Some(e)),
    };

    aviso_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;
    if let Some(e) = settings_error {
        let path = cli
            .settings
            .clone()
            .unwrap_or_else(aviso_settings::settings_path);
        tracing::warn!(path = %path.display(), error = %e, "failed to load settings, using defaults");
    }

    let metrics = aviso_server::metrics::install_recorder();
    let config = server_config(&settings, &cli);
    let server = AvisoServer::new(config, metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        notifications = server.config().notifications.enabled,
        interval_secs = server.config().notifications.interval_secs,
        "aviso listening on ws://{addr}/ws"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_are_empty() {
        let cli = Cli::parse_from(["aviso"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.settings.is_none());
        assert!(!cli.no_notifications);
    }

    #[test]
    fn config_uses_settings_without_flags() {
        let cli = Cli::parse_from(["aviso"]);
        let settings = AvisoSettings::default();
        let config = server_config(&settings, &cli);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.notifications.interval_secs, 10);
        assert!(config.notifications.enabled);
        assert_eq!(config.max_message_size, settings.server.max_message_bytes);
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "aviso",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--notify-interval-secs",
            "30",
            "--no-notifications",
        ]);
        let config = server_config(&AvisoSettings::default(), &cli);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.notifications.interval_secs, 30);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn zero_interval_flag_rejected() {
        let result = Cli::try_parse_from(["aviso", "--notify-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn settings_path_flag() {
        let cli = Cli::parse_from(["aviso", "--settings", "/tmp/aviso.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/aviso.json")));
    }
}
