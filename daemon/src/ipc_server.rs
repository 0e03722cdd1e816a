use anyhow::{Context, Result};
use common::{Command, FeedError, PlayerEvent, Response};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, broadcast};

use crate::engine::Engine;
use crate::{DaemonState, commands, log_and_continue};

pub async fn start(
    socket_path: &Path,
    state: Arc<Mutex<DaemonState>>,
    engine: Arc<Engine>,
    events: broadcast::Sender<PlayerEvent>,
) -> Result<()> {
    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove stale socket {}", socket_path.display()))?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind {}", socket_path.display()))?;
    log::info!("IPC server listening on: {}", socket_path.display());

    loop {
        // Check if we should exit
        if state.lock().await.should_exit {
            break;
        }

        // Accept connections with timeout
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let state = state.clone();
                let engine = engine.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, state, engine, events).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => {
                // Timeout, continue loop to check exit condition
                continue;
            }
        }
    }

    // Clean up socket
    log_and_continue!(std::fs::remove_file(socket_path), "remove socket");
    log::info!("IPC server stopped");
    Ok(())
}

async fn handle_client(
    stream: UnixStream,
    state: Arc<Mutex<DaemonState>>,
    engine: Arc<Engine>,
    events: broadcast::Sender<PlayerEvent>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Command>(&line) {
            Ok(Command::Subscribe) => {
                // Subscribe before acknowledging so no event is missed
                let receiver = events.subscribe();
                write_response(&mut writer, &Response::Subscribed).await?;
                return stream_events(&mut writer, receiver).await;
            }
            Ok(Command::Kill) => {
                log::info!("Received kill command");
                state.lock().await.should_exit = true;
                Response::Ok
            }
            Ok(command) => commands::handle_command(&engine, command).await,
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(FeedError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        write_response(&mut writer, &response).await?;
        line.clear();
    }

    Ok(())
}

/// Forward outward events until the client hangs up or the daemon stops
async fn stream_events<W>(writer: &mut W, mut receiver: broadcast::Receiver<PlayerEvent>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if let Err(e) = write_response(writer, &Response::Event(event)).await {
                    log::debug!("Subscriber went away: {}", e);
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Subscriber lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response_json = serde_json::to_string(response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Drain the engine's event channel into the broadcast used by subscribers
pub async fn pump_events(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<PlayerEvent>,
    events: broadcast::Sender<PlayerEvent>,
) {
    while let Some(event) = rx.recv().await {
        // No subscriber is fine: the event is simply dropped
        let _ = events.send(event);
    }
}
