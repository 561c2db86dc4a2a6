use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::rpc::{RpcClient, RpcError};

/// A bound agent thread: the child's opaque thread id plus the working
/// directory it was started against.
#[derive(Debug, Clone)]
pub struct AgentThread {
    pub thread_id: String,
    pub cwd: String,
    pub archive_path: Option<String>,
}

/// Maps a browser-chosen logical session id to an agent-assigned thread,
/// guarded per-session so concurrent `getOrCreateThread` calls for the same
/// id collapse onto one `thread/start`.
pub struct SessionManager {
    threads: Mutex<HashMap<String, AgentThread>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fixed, conservative policy per the system's own choice, never proxied
    /// from the browser.
    fn turn_policy() -> Value {
        serde_json::json!({
            "approvalPolicy": "never",
            "sandboxPolicy": { "mode": "full-access" },
        })
    }

    pub async fn get_or_create_thread(
        &self,
        rpc: &RpcClient,
        session_id: &str,
        cwd: &str,
    ) -> Result<AgentThread, RpcError> {
        if let Some(existing) = self.threads.lock().await.get(session_id) {
            return Ok(existing.clone());
        }

        let session_lock = self.lock_for(session_id).await;
        let _guard = session_lock.lock().await;

        // Re-check: another caller may have won the race while we waited.
        if let Some(existing) = self.threads.lock().await.get(session_id) {
            return Ok(existing.clone());
        }

        let params = serde_json::json!({
            "cwd": cwd,
            "policy": Self::turn_policy(),
        });
        let result = rpc.call("thread/start", params).await?;

        let thread_id = result
            .get("thread")
            .and_then(|t| t.get("id"))
            .or_else(|| result.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| RpcError::Upstream("thread/start returned no id".into()))?
            .to_string();
        let archive_path = result
            .get("thread")
            .and_then(|t| t.get("archivePath"))
            .or_else(|| result.get("archivePath"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let thread = AgentThread {
            thread_id,
            cwd: cwd.to_string(),
            archive_path,
        };
        self.threads
            .lock()
            .await
            .insert(session_id.to_string(), thread.clone());

        Ok(thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_policy_is_never_overridable_from_input() {
        let policy = SessionManager::turn_policy();
        assert_eq!(policy["approvalPolicy"], "never");
    }
}
