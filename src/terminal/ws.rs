use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::framing;
use super::registry::{PtyEvent, PtyRegistry, SpawnParams};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlFrame {
    Open {
        id: String,
        cwd: String,
        shell: Option<String>,
        cols: u16,
        rows: u16,
    },
    Resize {
        id: String,
        cols: u16,
        rows: u16,
    },
    Close {
        id: String,
    },
}

fn opened(id: &str) -> Message {
    Message::Text(json!({ "type": "opened", "id": id }).to_string().into())
}

fn exited(id: &str, code: Option<i32>) -> Message {
    Message::Text(
        json!({ "type": "exit", "id": id, "code": code })
            .to_string()
            .into(),
    )
}

fn errored(id: &str, message: &str) -> Message {
    Message::Text(
        json!({ "type": "error", "id": id, "message": message })
            .to_string()
            .into(),
    )
}

/// Bridges one browser WebSocket to N PTY sessions. Sessions live in the
/// process-wide [`PtyRegistry`]; this connection only tracks the forwarding
/// tasks it started so it can tear them down (not the children) on close.
pub async fn handle_socket(socket: WebSocket, registry: Arc<PtyRegistry>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<ControlFrame>(&text) else {
                    continue;
                };
                match frame {
                    ControlFrame::Open {
                        id,
                        cwd,
                        shell,
                        cols,
                        rows,
                    } => {
                        handle_open(
                            &registry,
                            &outbound_tx,
                            &mut forwarders,
                            id,
                            cwd,
                            shell,
                            cols,
                            rows,
                        )
                        .await;
                    }
                    ControlFrame::Resize { id, cols, rows } => {
                        if let Some(session) = registry.get(&id).await {
                            if let Err(e) = session.resize(cols, rows) {
                                let _ = outbound_tx.send(errored(&id, &e.to_string()));
                            }
                        }
                    }
                    ControlFrame::Close { id } => {
                        let code = if let Some(session) = registry.get(&id).await {
                            session.kill();
                            session.exit_code()
                        } else {
                            None
                        };
                        registry.remove(&id).await;
                        if let Some(handle) = forwarders.remove(&id) {
                            handle.abort();
                        }
                        let _ = outbound_tx.send(exited(&id, code));
                    }
                }
            }
            Message::Binary(data) => {
                if let Some((id, payload)) = framing::decode(&data) {
                    if let Some(session) = registry.get(id).await {
                        if session.write_input(payload).is_err() {
                            let _ = outbound_tx.send(errored(id, "write failed"));
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Socket lost: detach, not kill. Forwarding tasks for this connection
    // stop; the PTY children and the registry entries stay alive for a
    // later `open` with the same id to reattach and replay the tail.
    for (_, handle) in forwarders {
        handle.abort();
    }
    writer_task.abort();
}

async fn handle_open(
    registry: &Arc<PtyRegistry>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
    id: String,
    cwd: String,
    shell: Option<String>,
    cols: u16,
    rows: u16,
) {
    let existing = registry.get(&id).await;
    let session = match existing {
        Some(s) if *s.state.lock().unwrap() != super::registry::PtyState::Exited => s,
        _ => {
            let params = SpawnParams {
                id: id.clone(),
                cwd,
                shell,
                cols,
                rows,
            };
            match registry.spawn(params).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, session_id = %id, "failed to spawn pty");
                    let _ = outbound_tx.send(errored(&id, &e.to_string()));
                    return;
                }
            }
        }
    };

    let tail = session.buffered_tail();
    if !tail.is_empty() {
        let _ = outbound_tx.send(Message::Binary(framing::encode(&id, &tail).into()));
    }

    let mut output_rx = session.output_tx.subscribe();
    let forward_id = id.clone();
    let forward_tx = outbound_tx.clone();
    let handle = tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(PtyEvent::Data(data)) => {
                    let frame = framing::encode(&forward_id, &data);
                    if forward_tx.send(Message::Binary(frame.into())).is_err() {
                        break;
                    }
                }
                Ok(PtyEvent::Error(message)) => {
                    let _ = forward_tx.send(errored(&forward_id, &message));
                }
                Ok(PtyEvent::Exited(code)) => {
                    let _ = forward_tx.send(exited(&forward_id, code));
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, session_id = %forward_id, "terminal subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    forwarders.insert(id.clone(), handle);
    let _ = outbound_tx.send(opened(&id));
}
