//! socks-server - SOCKS4a and SOCKS5 proxy server
//!
//! This is the main entry point for the socks-server binary.

use anyhow::{Context, Result};
use clap::Parser;
use socks_server::config::{load_config, AuthConfig, Config};
use socks_server::server::SocksServer;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// socks-server - SOCKS4a and SOCKS5 proxy server
#[derive(Parser, Debug)]
#[command(name = "socks-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// DNS server (ip:port) used to resolve destinations
    #[arg(long)]
    dns: Option<String>,

    /// Destination connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Username for USERNAME/PASSWORD authentication
    #[arg(long, env = "SOCKS_SERVER_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Password for USERNAME/PASSWORD authentication
    #[arg(long, env = "SOCKS_SERVER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply(&self, config: &mut Config) {
        let server = &mut config.server;

        if let Some(bind) = &self.bind {
            server.bind = bind.clone();
        }
        if let Some(dns) = &self.dns {
            server.dns = Some(dns.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            server.connect_timeout = timeout;
        }

        let username = self.username.as_deref().filter(|u| !u.is_empty());
        if let Some(username) = username {
            server.auth = Some(AuthConfig {
                username: username.to_string(),
                password: self.password.clone().unwrap_or_default(),
            });
        } else if let (Some(auth), Some(password)) = (server.auth.as_mut(), &self.password) {
            auth.password = password.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => Config::default(),
    };
    args.apply(&mut config);

    let server = SocksServer::from_config(&config.server).context("Invalid configuration")?;

    info!("socks-server v{}", socks_server::VERSION);
    match &config.server.auth {
        Some(auth) => info!("Authentication: USERNAME/PASSWORD (user {})", auth.username),
        None => warn!("Authentication: NO AUTHENTICATION REQUIRED"),
    }
    match &config.server.dns {
        Some(dns) => info!("DNS server: {}", dns),
        None => info!("DNS server: system resolver"),
    }

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx_clone.send(true);
    });

    server
        .listen_and_serve(&config.server.bind, shutdown_rx)
        .await
        .with_context(|| format!("Failed to serve on {}", config.server.bind))?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on unix
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
            }
            Err(e) => {
                warn!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }
}

/// Setup logging based on configuration
///
/// `RUST_LOG` directives, when set, refine the level given on the command line.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
