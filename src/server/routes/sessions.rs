use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ToolKind;
use crate::error::{AppError, AppResult};
use crate::scanner::{Timeline, TokenUsage};
use crate::server::AppState;
use crate::stats::{self, normalize_path, DailyUsage};

fn parse_tool(s: &str) -> AppResult<ToolKind> {
    s.parse().map_err(|()| AppError::InvalidArgument(format!("unknown tool '{s}'")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub cwd: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub timeline: Timeline,
}

#[derive(Deserialize)]
pub struct ToolQuery {
    pub tool: String,
}

/// Every historical session belonging to one project's workspace path.
pub async fn project_sessions(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    let project = state
        .store
        .get_project(project_id)
        .await
        .ok_or_else(|| AppError::NotFound("project not found".into()))?;

    let sessions = state.scanner.scan_all(project.tool_kind).await;
    let target = normalize_path(&project.workspace_path);

    let summaries = sessions
        .into_iter()
        .filter(|s| {
            s.cwd
                .as_deref()
                .map(|cwd| normalize_path(cwd) == target)
                .unwrap_or(false)
        })
        .map(|s| SessionSummary {
            id: s.id,
            cwd: s.cwd,
            created_at: s.created_at,
            last_event_at: s.last_event_at,
            timeline: s.timeline,
        })
        .collect();

    Ok(Json(summaries))
}

/// Rescans a tool's archive, streaming one `log:` event per file as it's
/// parsed, then a final `done:` event with the total session count.
pub async fn scan_sessions(
    State(state): State<AppState>,
    Query(q): Query<ToolQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let tool = parse_tool(&q.tool)?;

    let scanner = state.scanner.clone();
    let stream = stream! {
        let files = scanner.list_session_files(tool);
        let mut count = 0usize;
        for path in files {
            let session = scanner.parse_session(&path).await;
            count += 1;
            let message = format!("parsed {} ({})", path.display(), if session.timeline.partial { "partial" } else { "ok" });
            yield Ok(Event::default().event("log").data(message));
        }
        yield Ok(Event::default().event("done").data(serde_json::json!({ "sessionCount": count }).to_string()));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[derive(Deserialize)]
pub struct UsageQuery {
    pub tool: String,
    #[serde(default)]
    pub force: bool,
}

pub async fn total_usage(
    State(state): State<AppState>,
    Query(q): Query<UsageQuery>,
) -> AppResult<Json<TokenUsage>> {
    let tool = parse_tool(&q.tool)?;
    let cache_key = q.tool.clone();

    if !q.force {
        if let Some(cached) = state.total_usage_cache.get(&cache_key).await {
            return Ok(Json(cached));
        }
    }

    let sessions = state.scanner.scan_all(tool).await;
    let total = stats::total_usage(&sessions);
    state.total_usage_cache.put(cache_key, total).await;
    Ok(Json(total))
}

#[derive(Deserialize)]
pub struct DailyUsageQuery {
    pub tool: String,
    #[serde(default = "default_days")]
    pub days: i64,
    #[serde(default)]
    pub force: bool,
}

fn default_days() -> i64 {
    30
}

pub async fn daily_usage(
    State(state): State<AppState>,
    Query(q): Query<DailyUsageQuery>,
) -> AppResult<Json<Vec<DailyUsage>>> {
    let tool = parse_tool(&q.tool)?;
    let cache_key = format!("{}:{}", q.tool, q.days);

    if !q.force {
        if let Some(cached) = state.daily_usage_cache.get(&cache_key).await {
            return Ok(Json(cached));
        }
    }

    let sessions = state.scanner.scan_all(tool).await;
    let daily = stats::daily_usage(&sessions, q.days);
    state.daily_usage_cache.put(cache_key, daily.clone()).await;
    Ok(Json(daily))
}
