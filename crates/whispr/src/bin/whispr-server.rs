//! Whispr chat server.
//!
//! ```text
//! whispr-server --bind 0.0.0.0:5555 --users-file users.json
//! ```
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use whispr::{ServerConfig, WhisprError, WhisprServer};

#[derive(Parser, Debug)]
#[command(name = "whispr-server", version, about = "Encrypted multi-user chat server")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5555
    #[arg(long, env = "WHISPR_BIND")]
    bind: Option<String>,

    /// Persist accounts to this JSON file instead of memory
    #[arg(long, env = "WHISPR_USERS_FILE")]
    users_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), WhisprError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.users_file.is_some() {
        config.users_file = args.users_file;
    }

    let store = config.open_store()?;
    tracing::info!(
        bind = %config.bind_addr,
        users_file = ?config.users_file,
        "starting whispr-server"
    );
    let server = WhisprServer::builder().config(config).build(store).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
