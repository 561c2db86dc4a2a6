//! Translates the A2A `tasks/sendSubscribe` HTTP request into a live SSE
//! stream of notifications belonging to one chat turn.

mod session;

pub use session::{AgentThread, SessionManager};

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::Value;

use crate::rpc::{RpcClient, RpcEvent};

pub struct Gateway {
    pub rpc: Arc<RpcClient>,
    pub sessions: SessionManager,
}

impl Gateway {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            sessions: SessionManager::new(),
        }
    }
}

/// The parts of an A2A `tasks/sendSubscribe` request the gateway needs; `cwd`
/// is already resolved (projectId → workspace path, or the literal cwd) by
/// the HTTP layer before this is built.
pub struct TaskRequest {
    pub task_id: String,
    pub context_id: String,
    pub cwd: String,
    pub message_text: String,
}

fn error_event(task_id: &str, message: &str) -> Event {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": task_id,
        "error": { "message": message },
    });
    Event::default().data(body.to_string())
}

fn status_event(task_id: &str, status: &Value) -> Event {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": task_id,
        "result": { "statusUpdate": status },
    });
    Event::default().data(body.to_string())
}

/// Pulls the notification's message id out of whichever shape the child
/// uses; tool wire names differ, so this tries the common spots without
/// committing to one tool's vocabulary.
fn notification_message_id(raw: &Value) -> Option<&str> {
    raw.pointer("/params/status/message/messageId")
        .or_else(|| raw.pointer("/params/message/messageId"))
        .and_then(|v| v.as_str())
}

fn notification_status(raw: &Value) -> Value {
    raw.pointer("/params/status")
        .or_else(|| raw.get("params"))
        .cloned()
        .unwrap_or(Value::Null)
}

fn is_final(status: &Value) -> bool {
    status
        .get("final")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Runs the `tasks/sendSubscribe` algorithm end to end and returns the SSE
/// response: resolve thread, subscribe before sending, issue the turn,
/// forward matching notifications, close on `final` or error.
pub fn chat_turn_sse(
    gateway: Arc<Gateway>,
    request: TaskRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream! {
        let task_id = request.task_id.clone();
        let agent_message_id = format!("msg-agent-{}", task_id);

        let thread = match gateway
            .sessions
            .get_or_create_thread(&gateway.rpc, &request.context_id, &request.cwd)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                yield Ok(error_event(&task_id, &e.to_string()));
                return;
            }
        };

        // Subscribe before sending to avoid racing the child's notifications.
        let mut subscription = gateway.rpc.subscribe().await;

        let turn_params = serde_json::json!({
            "threadId": thread.thread_id,
            "messageId": agent_message_id,
            "parts": [{ "text": request.message_text }],
        });

        if let Err(e) = gateway.rpc.call("turn/send", turn_params).await {
            yield Ok(error_event(&task_id, &e.to_string()));
            return;
        }

        let mut turn_in_flight = true;

        while turn_in_flight {
            match subscription.rx.recv().await {
                Some(RpcEvent::Notification(n)) => {
                    let matches = match notification_message_id(&n.raw) {
                        Some(id) => id == agent_message_id,
                        None => turn_in_flight,
                    };
                    if !matches {
                        continue;
                    }
                    let status = notification_status(&n.raw);
                    let final_flag = is_final(&status);
                    yield Ok(status_event(&task_id, &status));
                    if final_flag {
                        turn_in_flight = false;
                    }
                }
                Some(RpcEvent::Stderr(line)) => {
                    tracing::debug!(line = %line, "rpc stderr during chat turn");
                }
                Some(RpcEvent::ChildExited { .. }) => {
                    yield Ok(error_event(&task_id, "agent process exited"));
                    return;
                }
                None => {
                    yield Ok(error_event(&task_id, "notification channel closed"));
                    return;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15)))
}
