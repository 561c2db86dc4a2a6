use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::launcher;

#[derive(Debug, Error, Clone)]
pub enum RpcError {
    #[error("failed to spawn child: {0}")]
    SpawnFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// A server-initiated notification, or a raw stderr line, fanned out to subscribers.
#[derive(Debug, Clone)]
pub enum RpcEvent {
    Notification(Notification),
    Stderr(String),
    /// Emitted once, to every live subscriber, when the child dies.
    ChildExited { code: Option<i32> },
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub method: Option<String>,
    /// The full parsed line, verbatim, so forwarders never drop fields they
    /// don't recognize.
    pub raw: Value,
}

pub struct Subscription {
    pub rx: mpsc::UnboundedReceiver<RpcEvent>,
}

struct PendingCall {
    tx: oneshot::Sender<Result<Value, RpcError>>,
}

struct ChildState {
    child: Child,
    stdin: ChildStdin,
}

/// Owns (at most) one live child process and multiplexes JSON-RPC traffic
/// over its stdio. The executable is resolved lazily on first use (not at
/// construction) so a missing CLI only fails the first request, never boot.
pub struct RpcClient {
    logical_name: String,
    extra_args: Vec<String>,
    next_id: AtomicI64,
    start_lock: Mutex<()>,
    state: Mutex<Option<ChildState>>,
    pending: Arc<Mutex<HashMap<i64, PendingCall>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<RpcEvent>>>>,
}

impl RpcClient {
    pub fn new(logical_name: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            extra_args,
            next_id: AtomicI64::new(1),
            start_lock: Mutex::new(()),
            state: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Idempotent. Starts the child if none is alive. Concurrent callers
    /// collapse onto the single `start_lock`.
    pub async fn ensure_started(&self) -> Result<(), RpcError> {
        let _guard = self.start_lock.lock().await;

        {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.as_mut() {
                if existing.child.try_wait().ok().flatten().is_none() {
                    return Ok(());
                }
                *state = None;
            }
        }

        let descriptor = launcher::build_spawn_descriptor(
            &self.logical_name,
            None,
            self.extra_args.clone(),
            None,
            Default::default(),
        )
        .await
        .map_err(|e| RpcError::SpawnFailed(e.to_string()))?;

        let mut command = descriptor.into_command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| RpcError::SpawnFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RpcError::SpawnFailed("no stdin handle".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RpcError::SpawnFailed("no stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RpcError::SpawnFailed("no stderr handle".into()))?;

        spawn_stdout_reader(stdout, self.pending.clone(), self.subscribers.clone());
        spawn_stderr_reader(stderr, self.subscribers.clone());

        {
            let mut state = self.state.lock().await;
            *state = Some(ChildState { child, stdin });
        }

        let identity = serde_json::json!({
            "clientInfo": { "name": "dockhand", "version": env!("CARGO_PKG_VERSION") },
        });
        self.send_and_await("initialize", identity).await?;

        tracing::info!("rpc child started");
        Ok(())
    }

    /// Send one request and await its matching reply, starting the child
    /// first if necessary.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.ensure_started().await?;
        self.send_and_await(method, params).await
    }

    /// Write one request and await its matching reply. Assumes a child is
    /// already running; used both by `call` and by the `initialize`
    /// handshake performed inline in `ensure_started`.
    async fn send_and_await(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, PendingCall { tx });

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_string(&request)
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        line.push('\n');

        let write_result = {
            let mut state = self.state.lock().await;
            match state.as_mut() {
                Some(s) => s.stdin.write_all(line.as_bytes()).await,
                None => return Err(RpcError::Transport("child not running".into())),
            }
        };

        if let Err(e) = write_result {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::Transport(e.to_string()));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Transport("completion dropped".into())),
        }
    }

    /// Subscribe to notifications and stderr lines. Drop the returned
    /// [`Subscription`] to unsubscribe; dead senders are pruned lazily on
    /// the next broadcast.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        Subscription { rx }
    }
}

/// Classify one stdout line as a response or a notification and dispatch it.
/// Lines that fail to parse as JSON are reported as stderr events, not dropped.
async fn dispatch_line(
    line: &str,
    pending: &Arc<Mutex<HashMap<i64, PendingCall>>>,
    subscribers: &Arc<Mutex<Vec<mpsc::UnboundedSender<RpcEvent>>>>,
) {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            broadcast(subscribers, RpcEvent::Stderr(line.to_string())).await;
            return;
        }
    };

    let id = value.get("id").and_then(parse_flexible_id);

    if let Some(id) = id {
        let mut guard = pending.lock().await;
        if let Some(call) = guard.remove(&id) {
            drop(guard);
            let result = match value.get("error") {
                Some(err) if !err.is_null() => {
                    let message = err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("upstream error")
                        .to_string();
                    Err(RpcError::Upstream(message))
                }
                _ => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = call.tx.send(result);
            return;
        }
    }

    let method = value
        .get("method")
        .and_then(|m| m.as_str())
        .map(|s| s.to_string());
    broadcast(
        subscribers,
        RpcEvent::Notification(Notification { method, raw: value }),
    )
    .await;
}

fn parse_flexible_id(id: &Value) -> Option<i64> {
    if let Some(n) = id.as_i64() {
        return Some(n);
    }
    id.as_str().and_then(|s| s.parse().ok())
}

async fn broadcast(subscribers: &Arc<Mutex<Vec<mpsc::UnboundedSender<RpcEvent>>>>, event: RpcEvent) {
    let mut guard = subscribers.lock().await;
    guard.retain(|tx| tx.send(event.clone()).is_ok());
}

fn spawn_stdout_reader(
    stdout: tokio::process::ChildStdout,
    pending: Arc<Mutex<HashMap<i64, PendingCall>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<RpcEvent>>>>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    dispatch_line(&line, &pending, &subscribers).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "rpc stdout read error");
                    break;
                }
            }
        }
        fail_all_pending(&pending).await;
        broadcast(&subscribers, RpcEvent::ChildExited { code: None }).await;
    });
}

fn spawn_stderr_reader(
    stderr: tokio::process::ChildStderr,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<RpcEvent>>>>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            broadcast(&subscribers, RpcEvent::Stderr(line)).await;
        }
    });
}

async fn fail_all_pending(pending: &Arc<Mutex<HashMap<i64, PendingCall>>>) {
    let mut guard = pending.lock().await;
    for (_, call) in guard.drain() {
        let _ = call.tx.send(Err(RpcError::Transport("child process exited".into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_id_parses_number_and_string() {
        assert_eq!(parse_flexible_id(&serde_json::json!(42)), Some(42));
        assert_eq!(parse_flexible_id(&serde_json::json!("42")), Some(42));
        assert_eq!(parse_flexible_id(&serde_json::json!("nope")), None);
    }

    #[tokio::test]
    async fn call_fails_cleanly_when_no_child_running() {
        let client = RpcClient::new("definitely-not-a-real-binary-xyz", vec![]);
        let result = client.call("noop", serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
