use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::ToolKind;
use crate::error::{AppError, AppResult};
use crate::server::AppState;
use crate::tools;

#[derive(Deserialize)]
pub struct ToolQuery {
    pub tool: String,
}

fn parse_tool(s: &str) -> AppResult<ToolKind> {
    s.parse().map_err(|()| AppError::InvalidArgument(format!("unknown tool '{s}'")))
}

pub async fn tool_status(Query(q): Query<ToolQuery>) -> AppResult<Json<Value>> {
    let tool = parse_tool(&q.tool)?;
    let status = tools::tool_status(tool).await;
    Ok(Json(serde_json::to_value(status).map_err(|e| AppError::Internal(e.into()))?))
}

pub async fn install_tool(
    State(state): State<AppState>,
    Query(q): Query<ToolQuery>,
) -> AppResult<Json<Value>> {
    let tool = parse_tool(&q.tool)?;
    let package = match tool {
        ToolKind::Codex => "@openai/codex",
        ToolKind::ClaudeCode => "@anthropic-ai/claude-code",
    };
    let job_id = state
        .jobs
        .spawn_install("npm".to_string(), vec!["install".into(), "-g".into(), package.into()])
        .await;
    Ok(Json(json!({ "jobId": job_id })))
}

pub async fn install_node(State(state): State<AppState>) -> AppResult<Json<Value>> {
    // Node itself has no single cross-platform installer; this job records
    // the attempt result of whatever package manager is already present.
    let job_id = state
        .jobs
        .spawn_install("npm".to_string(), vec!["install".into(), "-g".into(), "npm".into()])
        .await;
    Ok(Json(json!({ "jobId": job_id })))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let job = state
        .jobs
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("job not found".into()))?;
    Ok(Json(serde_json::to_value(job).map_err(|e| AppError::Internal(e.into()))?))
}
