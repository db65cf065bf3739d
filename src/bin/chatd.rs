//! chatd - presence-aware TCP broadcast chat server
//!
//! # Usage
//!
//! ```bash
//! # Listen on the defaults (127.0.0.1:8888, 10 second idle timeout)
//! chatd
//!
//! # Listen on every interface with a longer idle window
//! chatd --ip 0.0.0.0 --port 9000 --idle-timeout 300
//!
//! # Load settings from a file (flags still win)
//! chatd --config ./chatd.toml
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatd::config::ServerConfig;
use chatd::hub::spawn_hub;
use chatd::registry::spawn_registry;
use chatd::server::ChatServer;

/// chatd - line-based chat server with presence and idle eviction
#[derive(Parser, Debug)]
#[command(name = "chatd", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long)]
    ip: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Seconds of silence before a client is disconnected
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Layers command-line flags over the loaded configuration.
    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(ip) = &self.ip {
            config.ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.idle_timeout {
            config.set_idle_timeout_secs(secs);
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = args.apply(config);
    config.validate().context("Invalid configuration")?;

    run_server(config)
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatd=info".parse()?)
                .add_directive("chat_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chat server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Presence registry started");

    let hub = spawn_hub(registry.clone(), config.hub_capacity);
    info!("Broadcast hub started");

    let server = ChatServer::bind(&config, registry, hub, cancel_token)
        .await
        .with_context(|| format!("Failed to start server on {}", config.bind_addr()))?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chat server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
