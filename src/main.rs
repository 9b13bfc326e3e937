//! redlite server binary

use clap::Parser;
use redlite::{RedliteServer, Result, ServerConfig};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{fmt, EnvFilter};

/// redlite server
#[derive(Parser, Debug)]
#[command(name = "redlite-server")]
#[command(about = "Small RESP key-value server with RDB key listing")]
#[command(version)]
struct Args {
    /// Directory holding the RDB snapshot
    #[arg(long)]
    dir: Option<String>,

    /// RDB snapshot file name
    #[arg(long)]
    dbfilename: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen host
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// JSON config file; flags given on the command line take precedence
    #[arg(short, long)]
    config: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(dir) = self.dir {
            config.dir = dir;
        }
        if let Some(dbfilename) = self.dbfilename {
            config.dbfilename = dbfilename;
        }
        if let Some(port) = self.port {
            config.bind_addr = format!("{}:{}", self.bind, port);
        } else if self.config.is_none() {
            config.bind_addr = format!("{}:6379", self.bind);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(true).init();

    let config = args.into_config()?;
    tracing::info!(
        dir = %config.dir,
        dbfilename = %config.dbfilename,
        "redlite v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let server = Arc::new(RedliteServer::new(config).await?);

    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }

        tracing::info!("received Ctrl+C, initiating graceful shutdown");
        if let Err(e) = server_clone.shutdown() {
            tracing::error!(error = %e, "failed to initiate shutdown");
        }
    });

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    Ok(())
}
