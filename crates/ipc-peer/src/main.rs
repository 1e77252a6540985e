//! ipc-peer: a local IPC endpoint and test client.
//!
//! # Usage
//!
//! ```text
//! ipc-peer [OPTIONS] <COMMAND>
//!
//! Commands:
//!   serve                Accept peers; answer Ping with Pong, echo Echo
//!   ping [--count N]     Send N pings and wait for the pongs
//!        [--shutdown-server]
//!   echo <TEXT>          Send TEXT and print the reply
//!
//! Options:
//!   --config   <PATH>    TOML config file            [env: IPC_CONFIG]
//!   --endpoint <NAME>    Socket name or path         [env: IPC_ENDPOINT]
//! ```
//!
//! The log filter comes from `RUST_LOG`, falling back to the config file's
//! `log_level` (default `info`).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ipc_peer::application::{run_echo, run_ping, serve};
use ipc_peer::domain::PeerConfig;
use ipc_peer::infrastructure::{load_config, LocalSocketListener};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Local IPC peer over Unix domain sockets.
#[derive(Debug, Parser)]
#[command(name = "ipc-peer", about = "Local IPC endpoint and test client", version)]
struct Cli {
    /// TOML configuration file.  A missing file means defaults.
    #[arg(long, env = "IPC_CONFIG")]
    config: Option<PathBuf>,

    /// Endpoint to serve on or connect to.  Overrides the config file.
    ///
    /// A bare name is placed in the system temp directory; anything with a
    /// `/` is used as a path.
    #[arg(long, env = "IPC_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Accept peers and answer their commands until Ctrl+C or a Shutdown.
    Serve,
    /// Send pings and wait for every pong.
    Ping {
        /// Number of pings to send.
        #[arg(long, default_value_t = 4)]
        count: u64,

        /// Ask the server to stop once all pongs are in.
        #[arg(long)]
        shutdown_server: bool,
    },
    /// Send one Echo command and print the reply.
    Echo {
        /// Text to send.
        text: String,
    },
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn resolve_config(&self) -> anyhow::Result<PeerConfig> {
        let mut config = load_config(self.config.as_deref()).with_context(|| {
            format!(
                "failed to load configuration from {}",
                self.config.as_deref().map_or("<none>".into(), |p| p.display().to_string())
            )
        })?;
        if let Some(endpoint) = &self.endpoint {
            config.connection.endpoint = endpoint.clone();
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let connection = config.connection;
    match cli.mode {
        Mode::Serve => {
            let listener = LocalSocketListener::bind(&connection.endpoint)
                .context("failed to start server")?;
            let served = serve(listener, connection, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for Ctrl+C signal: {e}");
                    std::future::pending::<()>().await;
                }
            })
            .await?;
            info!(served, "ipc-peer stopped");
        }
        Mode::Ping {
            count,
            shutdown_server,
        } => {
            let endpoint = connection.endpoint.clone();
            let report = run_ping(connection, count, shutdown_server)
                .await
                .with_context(|| format!("ping to {endpoint} failed"))?;
            println!(
                "{} pings sent, {} pongs received in {:.2?}",
                report.sent, report.received, report.elapsed
            );
        }
        Mode::Echo { text } => {
            let endpoint = connection.endpoint.clone();
            let reply = run_echo(connection, text)
                .await
                .with_context(|| format!("echo to {endpoint} failed"))?;
            println!("{reply}");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
