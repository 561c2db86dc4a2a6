use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::ToolKind;
use crate::error::{AppError, AppResult};
use crate::server::AppState;
use crate::store::Project;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFilterQuery {
    pub tool_kind: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub tool_kind: String,
    pub name: String,
    pub workspace_path: String,
    pub provider_id: Option<Uuid>,
    pub model: Option<String>,
}

fn parse_tool(s: &str) -> AppResult<ToolKind> {
    s.parse().map_err(|()| AppError::InvalidArgument(format!("unknown tool '{s}'")))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(q): Query<ToolFilterQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let filter = q.tool_kind.as_deref().map(parse_tool).transpose()?;
    Ok(Json(state.store.list_projects(filter).await))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<ProjectInput>,
) -> AppResult<Json<Project>> {
    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        tool_kind: parse_tool(&input.tool_kind)?,
        name: input.name,
        workspace_path: input.workspace_path,
        provider_id: input.provider_id,
        model: input.model,
        created_at: now,
        updated_at: now,
        last_started_at: None,
    };
    Ok(Json(state.store.create_project(project).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> AppResult<Json<Project>> {
    let existing = state
        .store
        .get_project(id)
        .await
        .ok_or_else(|| AppError::NotFound("project not found".into()))?;
    let project = Project {
        id,
        tool_kind: parse_tool(&input.tool_kind)?,
        name: input.name,
        workspace_path: input.workspace_path,
        provider_id: input.provider_id,
        model: input.model,
        created_at: existing.created_at,
        updated_at: Utc::now(),
        last_started_at: existing.last_started_at,
    };
    Ok(Json(state.store.update_project(project).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<()> {
    state.store.delete_project(id).await
}
