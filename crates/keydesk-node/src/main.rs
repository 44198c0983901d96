mod config;
mod handler;
mod socket;

use anyhow::{Context, Result};
use clap::Parser;
use config::{NodeConfig, default_state_dir, ensure_state_dir};
use handler::NodeState;
use keydesk::client::default_socket_path;
use keydesk_signer::HotSigner;
use keydesk_store::StateStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Backend id of the software signer enabled by `--hot`.
const HOT_SIGNER_ID: &str = "hot";

#[derive(Parser, Debug)]
#[command(author, version, about = "keydesk signer session daemon")]
struct Args {
    /// Path to the Unix socket.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// State directory for settings and hot keys.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/keydesk/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Register a software signer backed by a key in the state directory.
    #[arg(long)]
    hot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keydesk_node=info,keydesk_session=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = NodeConfig::load(args.config.as_deref()).context("failed to load config")?;

    let state_dir = match args.state_dir.or(config.state_dir.clone()) {
        Some(dir) => dir,
        None => default_state_dir()?,
    };
    ensure_state_dir(&state_dir)?;

    let socket_path = args
        .socket
        .or(config.socket_path.clone())
        .unwrap_or_else(default_socket_path);

    let store = StateStore::load(&state_dir).context("failed to load settings")?;
    let state = NodeState::new(config.session.clone(), store);

    if args.hot {
        let hot = HotSigner::load_or_create(HOT_SIGNER_ID, &state_dir)
            .context("failed to set up hot signer")?;
        eprintln!();
        eprintln!(
            "  \x1b[1;33m!! HOT SIGNER: key material lives unencrypted in {}\x1b[0m",
            state_dir.display()
        );
        eprintln!();
        state.session.register_signer(Arc::new(hot)).await;
    }

    tracing::info!(
        state_dir = %state_dir.display(),
        short_grace_ms = config.session.short_grace_ms,
        error_grace_ms = config.session.error_grace_ms,
        "keydesk-node starting"
    );

    // Run Unix socket server (returns on a client shutdown request)
    tokio::select! {
        result = socket::serve(state.clone(), &socket_path) => {
            result.context("socket server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
    }

    state.session.shutdown().await;
    std::fs::remove_file(&socket_path).ok();
    tracing::info!("keydesk-node shut down");
    Ok(())
}
