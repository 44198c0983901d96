use crate::handler::{NodeState, handle_request};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use keydesk::protocol::{MAX_LINE_BYTES, Request, Response};
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::{broadcast, watch};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Start the Unix socket server. Returns once a client requests shutdown.
pub async fn serve(state: Arc<NodeState>, socket_path: &Path) -> Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).ok();
        }
    }

    // Remove stale socket
    if socket_path.exists() {
        std::fs::remove_file(socket_path).ok();
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600)).ok();
    }

    tracing::info!(path = %socket_path.display(), "Unix socket listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(state, stream, shutdown_tx).await {
                        tracing::debug!(err = %e, "client disconnected");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown requested by client");
                return Ok(());
            }
        }
    }
}

async fn handle_client(
    state: Arc<NodeState>,
    stream: tokio::net::UnixStream,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let (r, w) = stream.into_split();
    let mut reader = FramedRead::new(r, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut writer = FramedWrite::new(w, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let hello = Response::Hello {
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    writer.send(serde_json::to_string(&hello)?).await?;

    let mut event_rx = state.session.subscribe();

    loop {
        tokio::select! {
            line = reader.next() => {
                let Some(line) = line else { break };
                let line = line?;
                let resp = match serde_json::from_str::<Request>(&line) {
                    Ok(req) => {
                        let is_shutdown = matches!(req, Request::Shutdown);
                        let resp = handle_request(&state, req).await;
                        if is_shutdown {
                            writer.send(serde_json::to_string(&resp)?).await?;
                            let _ = shutdown_tx.send(true);
                            break;
                        }
                        resp
                    }
                    Err(e) => {
                        tracing::debug!(err = %e, "malformed request");
                        Response::Error {
                            code: "invalid_request".to_string(),
                            message: e.to_string(),
                        }
                    }
                };
                writer.send(serde_json::to_string(&resp)?).await?;
            }
            event = event_rx.recv() => {
                match event {
                    Ok(b) => {
                        let resp = Response::Event {
                            channel: b.channel,
                            event: b.event,
                        };
                        writer.send(serde_json::to_string(&resp)?).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "client lagging, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}
