//! Thin wrapper over the system `git` binary: status/diff/log/stage/unstage/
//! commit/push/pull, parsing porcelain output. Grounded on the spawn +
//! `current_dir` + `status.success()` pattern used throughout this system's
//! own git-worktree plumbing, generalized to the small set of operations the
//! gateway's HTTP surface needs.

use std::path::Path;
use std::process::Output;

use serde::Serialize;
use tokio::process::Command;

use crate::error::AppError;

async fn run_git(cwd: &Path, args: &[&str]) -> Result<Output, AppError> {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .await
        .map_err(|e| AppError::Transport(format!("failed to run git: {e}")))?;
    Ok(output)
}

fn require_success(output: &Output) -> Result<(), AppError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(AppError::Upstream(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub path: String,
    pub index_status: char,
    pub worktree_status: char,
}

/// `git status --porcelain=v2` parsed into per-file entries.
pub async fn status(cwd: &Path) -> Result<Vec<FileStatus>, AppError> {
    let output = run_git(cwd, &["status", "--porcelain=v2"]).await?;
    require_success(&output)?;
    let text = String::from_utf8_lossy(&output.stdout);

    let mut entries = Vec::new();
    for line in text.lines() {
        let mut fields = line.split(' ');
        match fields.next() {
            Some("1") | Some("2") => {
                let xy = fields.next().unwrap_or("..");
                let mut chars = xy.chars();
                let index_status = chars.next().unwrap_or('.');
                let worktree_status = chars.next().unwrap_or('.');
                if let Some(path) = line.rsplit('\t').next().or_else(|| line.split(' ').last()) {
                    entries.push(FileStatus {
                        path: path.to_string(),
                        index_status,
                        worktree_status,
                    });
                }
            }
            Some("?") => {
                if let Some(path) = fields.next() {
                    entries.push(FileStatus {
                        path: path.to_string(),
                        index_status: '?',
                        worktree_status: '?',
                    });
                }
            }
            _ => {}
        }
    }
    Ok(entries)
}

pub async fn diff(cwd: &Path, file: Option<&str>) -> Result<String, AppError> {
    let mut args = vec!["diff"];
    if let Some(f) = file {
        args.push("--");
        args.push(f);
    }
    let output = run_git(cwd, &args).await?;
    require_success(&output)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub hash: String,
    pub author: String,
    pub timestamp: String,
    pub message: String,
}

pub async fn log(cwd: &Path, max_count: u32) -> Result<Vec<LogEntry>, AppError> {
    let max_arg = format!("-{max_count}");
    let output = run_git(
        cwd,
        &["log", &max_arg, "--pretty=format:%H%x1f%an%x1f%aI%x1f%s"],
    )
    .await?;
    require_success(&output)?;
    let text = String::from_utf8_lossy(&output.stdout);

    Ok(text
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, '\u{1f}');
            Some(LogEntry {
                hash: parts.next()?.to_string(),
                author: parts.next()?.to_string(),
                timestamp: parts.next()?.to_string(),
                message: parts.next().unwrap_or("").to_string(),
            })
        })
        .collect())
}

pub async fn stage(cwd: &Path, file: &str) -> Result<(), AppError> {
    let output = run_git(cwd, &["add", "--", file]).await?;
    require_success(&output)
}

pub async fn unstage(cwd: &Path, file: &str) -> Result<(), AppError> {
    let output = run_git(cwd, &["restore", "--staged", "--", file]).await?;
    require_success(&output)
}

pub async fn commit(cwd: &Path, message: &str) -> Result<(), AppError> {
    let output = run_git(cwd, &["commit", "-m", message]).await?;
    require_success(&output)
}

pub async fn push(cwd: &Path) -> Result<(), AppError> {
    let output = run_git(cwd, &["push"]).await?;
    require_success(&output)
}

pub async fn pull(cwd: &Path) -> Result<(), AppError> {
    let output = run_git(cwd, &["pull"]).await?;
    require_success(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn init_repo(path: &Path) {
        Command::new("git")
            .current_dir(path)
            .args(["init", "-q"])
            .output()
            .await
            .unwrap();
        Command::new("git")
            .current_dir(path)
            .args(["config", "user.email", "test@example.com"])
            .output()
            .await
            .unwrap();
        Command::new("git")
            .current_dir(path)
            .args(["config", "user.name", "Test"])
            .output()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stage_then_unstage_leaves_index_unchanged() {
        let dir = tempdir().unwrap();
        init_repo(dir.path()).await;
        tokio::fs::write(dir.path().join("a.txt"), "hello").await.unwrap();

        stage(dir.path(), "a.txt").await.unwrap();
        let staged = status(dir.path()).await.unwrap();
        assert!(staged.iter().any(|f| f.path == "a.txt"));

        unstage(dir.path(), "a.txt").await.unwrap();
        let after = status(dir.path()).await.unwrap();
        let entry = after.iter().find(|f| f.path == "a.txt").unwrap();
        assert_eq!(entry.index_status, '?');
    }
}
