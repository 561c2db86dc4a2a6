use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::chat_turn_sse;
use crate::gateway::TaskRequest;
use crate::server::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnInput {
    pub task_id: Option<String>,
    pub context_id: String,
    pub project_id: Option<Uuid>,
    pub cwd: Option<String>,
    pub message: String,
}

/// Resolves `projectId` to a workspace path (falling back to a literal
/// `cwd`) and hands the turn off to the Agent Gateway's SSE stream — the
/// HTTP-layer half of the `tasks/sendSubscribe` algorithm.
pub async fn chat_turn(
    State(state): State<AppState>,
    Json(input): Json<ChatTurnInput>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let cwd = match (input.project_id, input.cwd) {
        (Some(project_id), _) => {
            let mut project = state
                .store
                .get_project(project_id)
                .await
                .ok_or_else(|| AppError::NotFound("project not found".into()))?;
            let workspace_path = project.workspace_path.clone();
            project.last_started_at = Some(chrono::Utc::now());
            state.store.update_project(project).await?;
            workspace_path
        }
        (None, Some(cwd)) => cwd,
        (None, None) => {
            return Err(AppError::InvalidArgument(
                "either projectId or cwd is required".into(),
            ))
        }
    };

    let request = TaskRequest {
        task_id: input.task_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        context_id: input.context_id,
        cwd,
        message_text: input.message,
    };

    Ok(chat_turn_sse(state.gateway.clone(), request))
}
