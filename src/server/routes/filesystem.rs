use std::path::{Path, PathBuf};

use axum::extract::Query;
use axum::Json;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};

const MAX_READ_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_MAX_SEARCH_MATCHES: usize = 500;
const MAX_SEARCH_FILES: usize = 5_000;

#[derive(Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub current_path: String,
    pub directories: Vec<ListingEntry>,
    pub files: Vec<ListingEntry>,
}

pub async fn list_directory(Query(q): Query<PathQuery>) -> AppResult<Json<DirectoryListing>> {
    let root = PathBuf::from(&q.path);
    let mut read_dir = tokio::fs::read_dir(&root)
        .await
        .map_err(|e| AppError::InvalidArgument(format!("cannot read '{}': {e}", q.path)))?;

    let mut directories = Vec::new();
    let mut files = Vec::new();

    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path().display().to_string();
        let file_type = entry.file_type().await.map_err(|e| AppError::Internal(e.into()))?;
        let item = ListingEntry { name, path };
        if file_type.is_dir() {
            directories.push(item);
        } else {
            files.push(item);
        }
    }

    directories.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(DirectoryListing {
        current_path: root.display().to_string(),
        directories,
        files,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRead {
    pub content: String,
    pub truncated: bool,
    pub is_binary: bool,
    pub size_bytes: u64,
}

pub async fn read_file(Query(q): Query<PathQuery>) -> AppResult<Json<FileRead>> {
    let path = PathBuf::from(&q.path);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| AppError::InvalidArgument(format!("cannot stat '{}': {e}", q.path)))?;
    let size_bytes = metadata.len();

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let is_binary = bytes.iter().take(8000).any(|&b| b == 0);

    let truncated = bytes.len() > MAX_READ_BYTES;
    let slice = &bytes[..bytes.len().min(MAX_READ_BYTES)];
    let content = String::from_utf8_lossy(slice).to_string();

    Ok(Json(FileRead {
        content,
        truncated,
        is_binary,
        size_bytes,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub path: String,
    pub query: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    pub max_results: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub path: String,
    pub line_number: usize,
    pub line: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
    pub truncated: bool,
}

fn build_pattern(req: &SearchRequest) -> AppResult<Regex> {
    let pattern = if req.is_regex {
        req.query.clone()
    } else {
        regex::escape(&req.query)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!req.case_sensitive)
        .build()
        .map_err(|e| AppError::InvalidArgument(format!("invalid search pattern: {e}")))
}

pub async fn search_content(Json(req): Json<SearchRequest>) -> AppResult<Json<SearchResult>> {
    let max_matches = req.max_results.unwrap_or(DEFAULT_MAX_SEARCH_MATCHES);
    let pattern = build_pattern(&req)?;
    let root = Path::new(&req.path);

    let mut matches = Vec::new();
    let mut total_matches = 0usize;
    let mut truncated = false;
    let mut files_scanned = 0usize;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.path().is_file() {
            continue;
        }
        files_scanned += 1;
        if files_scanned > MAX_SEARCH_FILES {
            truncated = true;
            break;
        }

        let Ok(contents) = tokio::fs::read_to_string(entry.path()).await else {
            continue;
        };

        for (idx, line) in contents.lines().enumerate() {
            if pattern.is_match(line) {
                total_matches += 1;
                if matches.len() < max_matches {
                    matches.push(SearchMatch {
                        path: entry.path().display().to_string(),
                        line_number: idx + 1,
                        line: line.to_string(),
                    });
                } else {
                    truncated = true;
                }
            }
        }
    }

    Ok(Json(SearchResult {
        matches,
        total_matches,
        truncated,
    }))
}
