//! remora server binary
//!
//! ## Usage
//!
//! ```bash
//! # Run on the default port (15440), paths passed through as given
//! remora-server
//!
//! # Confine clients to a directory, port from the environment
//! REMORA_PORT=2049 remora-server --root /srv/files
//!
//! # Everything from a config file; flags override it
//! remora-server --config remora.toml --close-on-session-end
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use remora_server::constants::PORT_ENV;
use remora_server::{FileServer, ServerConfig};

/// Remote file operation server.
#[derive(Parser, Debug)]
#[command(name = "remora-server")]
#[command(about = "Serve POSIX-style file operations to remote clients")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = PORT_ENV)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Confine client paths beneath this directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Close a session's descriptors when its connection ends
    #[arg(long)]
    close_on_session_end: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };

        let ip = self.bind.unwrap_or(config.bind_addr.ip());
        let port = self.port.unwrap_or(config.bind_addr.port());
        config.bind_addr = SocketAddr::new(ip, port);

        if let Some(root) = self.root {
            config.service.root = Some(root);
        }
        if self.close_on_session_end {
            config.service.close_on_session_end = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("Server error: {e:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config()?;
    tracing::info!(
        bind = %config.bind_addr,
        root = ?config.service.root,
        close_on_session_end = config.service.close_on_session_end,
        "Starting remora server"
    );

    let server = FileServer::bind(config)
        .await
        .context("binding listener")?;
    server.run().await.context("serving")?;
    Ok(())
}
