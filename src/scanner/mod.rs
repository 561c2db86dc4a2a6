//! Walks a tool's on-disk session archive, parses each JSONL file into a
//! reconstructed timeline, and caches results keyed by file identity.

mod cache;
mod provider;
mod record;
mod timeline;

pub use cache::{default_aggregate_ttl, AggregateCache, FileCache};
pub use provider::archive_root;
pub use record::{parse_line, Record, RecordKind, TokenUsage};
pub use timeline::{reconstruct, Span, SpanKind, Timeline};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::domain::ToolKind;

/// A historical session, derived read-only from an archive file. Never
/// mutates the archive; holds only immutable derived values.
#[derive(Debug, Clone)]
pub struct HistoricalSession {
    pub id: String,
    pub file_path: PathBuf,
    pub cwd: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub timeline: Timeline,
}

/// Synthesize a stable id from the file path (the archive has no session id
/// of its own in the header format this implementation chose).
fn synthetic_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct Scanner {
    pub file_cache: FileCache,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            file_cache: FileCache::new(),
        }
    }

    /// Enumerate every `.jsonl` file under the tool's archive root. A
    /// missing root yields an empty result, not an error.
    pub fn list_session_files(&self, tool: ToolKind) -> Vec<PathBuf> {
        let Some(root) = archive_root(tool) else {
            return Vec::new();
        };
        if !root.exists() {
            return Vec::new();
        }

        WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| e.path().extension().map(|ext| ext == "jsonl").unwrap_or(false))
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// Parse (or fetch from cache) a single archive file into a
    /// [`HistoricalSession`]. Never aborts on a bad line — a parse failure
    /// anywhere in the file marks the session `partial` but keeps every span
    /// reconstructed up to that point.
    pub async fn parse_session(&self, path: &Path) -> HistoricalSession {
        if let Some(cached) = self.file_cache.get_if_fresh(path).await {
            return HistoricalSession {
                id: synthetic_id(path),
                file_path: path.to_path_buf(),
                cwd: cached.cwd.clone(),
                created_at: cached.created_at,
                last_event_at: cached.last_event_at,
                timeline: cached,
            };
        }

        let contents = tokio::fs::read_to_string(path).await.unwrap_or_default();
        let mut records = Vec::new();
        let mut partial = false;

        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match record::parse_line(line, i) {
                Ok(record) => records.push(record),
                Err(()) => {
                    partial = true;
                    tracing::warn!(path = %path.display(), line = i, "unparseable archive line");
                }
            }
        }

        records.sort_by(|a, b| a.ts.cmp(&b.ts).then(a.order.cmp(&b.order)));

        let timeline = reconstruct(&records, partial);
        self.file_cache.put(path.to_path_buf(), timeline.clone()).await;

        HistoricalSession {
            id: synthetic_id(path),
            file_path: path.to_path_buf(),
            cwd: timeline.cwd.clone(),
            created_at: timeline.created_at,
            last_event_at: timeline.last_event_at,
            timeline,
        }
    }

    /// Enumerate and parse every session for a tool. Individual file
    /// failures are reflected as `partial` sessions, never as a failed scan.
    pub async fn scan_all(&self, tool: ToolKind) -> Vec<HistoricalSession> {
        let mut sessions = Vec::new();
        for path in self.list_session_files(tool) {
            sessions.push(self.parse_session(&path).await);
        }
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn parses_a_well_formed_session_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"ts":"2026-01-01T00:00:00Z","kind":"session-meta","cwd":"/w"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:01Z","kind":"function-call"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:02Z","kind":"function-result"}"#, "\n",
            ),
        )
        .await
        .unwrap();

        let scanner = Scanner::new();
        let session = scanner.parse_session(&path).await;
        assert!(!session.timeline.partial);
        assert_eq!(session.cwd.as_deref(), Some("/w"));
    }

    #[tokio::test]
    async fn marks_session_partial_on_broken_line_without_skipping_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"ts":"2026-01-01T00:00:00Z","kind":"session-meta","cwd":"/w"}"#, "\n",
                "not json at all\n",
            ),
        )
        .await
        .unwrap();

        let scanner = Scanner::new();
        let session = scanner.parse_session(&path).await;
        assert!(session.timeline.partial);
        assert_eq!(session.timeline.event_counts.get("session-meta"), Some(&1));
    }

    #[tokio::test]
    async fn scan_distinguishes_a_complete_file_from_a_partial_one() {
        let home = tempdir().unwrap();
        // SAFETY: test-only env mutation.
        unsafe {
            std::env::set_var("HOME", home.path());
        }
        let root = home.path().join(".codex").join("sessions");
        tokio::fs::create_dir_all(&root).await.unwrap();

        tokio::fs::write(
            root.join("a.jsonl"),
            concat!(
                r#"{"ts":"2026-01-01T00:00:00Z","kind":"session-meta","cwd":"/w"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:01Z","kind":"function-call"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:03Z","kind":"function-result"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:03Z","kind":"generation-start"}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:04Z","kind":"token-count","input":10,"output":20}"#, "\n",
                r#"{"ts":"2026-01-01T00:00:05Z","kind":"generation-end"}"#, "\n",
            ),
        )
        .await
        .unwrap();
        tokio::fs::write(root.join("b.jsonl"), "not json at all\n")
            .await
            .unwrap();

        let scanner = Scanner::new();
        let sessions = scanner.scan_all(ToolKind::Codex).await;
        assert_eq!(sessions.len(), 2);

        let a = sessions.iter().find(|s| s.id == "a").unwrap();
        assert!(!a.timeline.partial);
        assert_eq!(a.timeline.spans.len(), 3);
        assert_eq!(a.timeline.spans[2].token_count, 30);

        let b = sessions.iter().find(|s| s.id == "b").unwrap();
        assert!(b.timeline.partial);
        assert!(b.timeline.event_counts.is_empty());
    }

    #[tokio::test]
    async fn missing_archive_root_yields_empty_list_not_error() {
        // SAFETY: test-only env mutation.
        unsafe {
            std::env::set_var("HOME", "/nonexistent-dockhand-test-home");
        }
        let scanner = Scanner::new();
        let sessions = scanner.scan_all(ToolKind::ClaudeCode).await;
        assert!(sessions.is_empty());
    }
}
