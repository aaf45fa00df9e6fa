//! Rendezvous server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │               RENDEZVOUS SERVER               │
//!                      │                                              │
//!   SIGTERM / SIGINT ──┼─▶ signals ──▶ shutdown token                 │
//!                      │                    │                         │
//!                      │                    ▼                         │
//!                      │  credentials ─▶ coordinator ─▶ listener task │
//!                      │  (srv_auth.txt)     │             │          │
//!                      │                     ▼             ▼          │
//!   Client ────────────┼──────────────▶ route table ◀── connections   │
//!                      │                     │                        │
//!                      │                     ▼                        │
//!                      │          mailboxes / pairing codes           │
//!                      └──────────────────────────────────────────────┘
//! ```
//!
//! The binary is the only place that turns an error into a process exit.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use rendezvous_server::config::{self, ServerConfig};
use rendezvous_server::observability::{logging, metrics};
use rendezvous_server::Coordinator;

#[derive(Parser)]
#[command(name = "rendezvous-server")]
#[command(about = "Rendezvous server for pairing two clients", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Auth token written to srv_auth.txt at startup.
    #[arg(long)]
    auth_token: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn resolve_config(&self) -> Result<ServerConfig, config::ConfigError> {
        config::load_config(self.config.as_deref(), |config| {
            if let Some(port) = self.port {
                config.port = port;
            }
            if let Some(token) = &self.auth_token {
                config.auth_token = token.clone();
            }
            if let Some(level) = &self.log_level {
                config.observability.log_level = level.clone();
            }
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rendezvous-server: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("rendezvous-server: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = %config.version,
        port = config.port,
        grace_ms = config.shutdown.grace_period_ms,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        // Validation guarantees the address parses.
        if let Ok(addr) = addr.parse::<SocketAddr>() {
            if let Err(e) = metrics::init_exporter(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
                return ExitCode::FAILURE;
            }
        }
    }

    let coordinator = match Coordinator::new(config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!(error = %e, "Failed to construct rendezvous server");
            return ExitCode::FAILURE;
        }
    };

    // `run` logs the failure with its cause before returning it.
    match coordinator.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
