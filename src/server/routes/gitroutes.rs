use std::path::PathBuf;

use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::git;

#[derive(Deserialize)]
pub struct CwdQuery {
    pub cwd: String,
}

#[derive(Deserialize)]
pub struct DiffQuery {
    pub cwd: String,
    pub file: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub cwd: String,
    #[serde(default = "default_max_count")]
    pub max_count: u32,
}

fn default_max_count() -> u32 {
    50
}

#[derive(Deserialize)]
pub struct FileMutation {
    pub cwd: String,
    pub file: String,
}

#[derive(Deserialize)]
pub struct CommitInput {
    pub cwd: String,
    pub message: String,
}

pub async fn status(Query(q): Query<CwdQuery>) -> AppResult<Json<Vec<git::FileStatus>>> {
    Ok(Json(git::status(&PathBuf::from(q.cwd)).await?))
}

pub async fn diff(Query(q): Query<DiffQuery>) -> AppResult<Json<Value>> {
    let text = git::diff(&PathBuf::from(q.cwd), q.file.as_deref()).await?;
    Ok(Json(json!({ "diff": text })))
}

pub async fn log(Query(q): Query<LogQuery>) -> AppResult<Json<Vec<git::LogEntry>>> {
    Ok(Json(git::log(&PathBuf::from(q.cwd), q.max_count).await?))
}

pub async fn stage(Json(input): Json<FileMutation>) -> AppResult<()> {
    git::stage(&PathBuf::from(input.cwd), &input.file).await
}

pub async fn unstage(Json(input): Json<FileMutation>) -> AppResult<()> {
    git::unstage(&PathBuf::from(input.cwd), &input.file).await
}

pub async fn commit(Json(input): Json<CommitInput>) -> AppResult<()> {
    git::commit(&PathBuf::from(input.cwd), &input.message).await
}

pub async fn push(Json(input): Json<CwdQuery>) -> AppResult<()> {
    git::push(&PathBuf::from(input.cwd)).await
}

pub async fn pull(Json(input): Json<CwdQuery>) -> AppResult<()> {
    git::pull(&PathBuf::from(input.cwd)).await
}
