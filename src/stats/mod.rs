//! Pure derivations over the scanner's output: per-project totals and
//! per-local-day token usage buckets.

use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;

use crate::scanner::{HistoricalSession, TokenUsage};

/// Normalizes a workspace path the way the scanner's `cwd` comparison must:
/// case-insensitive (most of this system's target filesystems are
/// case-insensitive) and with any trailing separator stripped.
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches(['/', '\\']).to_ascii_lowercase()
}

/// Sum of every historical session whose recorded workspace normalizes to
/// `project_path`.
pub fn project_totals(sessions: &[HistoricalSession], project_path: &str) -> TokenUsage {
    let target = normalize_path(project_path);
    let mut total = TokenUsage::default();
    for session in sessions {
        let matches = session
            .cwd
            .as_deref()
            .map(|cwd| normalize_path(cwd) == target)
            .unwrap_or(false);
        if matches {
            total.add(&session.timeline.token_totals);
        }
    }
    total
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub usage: TokenUsage,
}

/// Buckets sessions by the **local date** of their last event timestamp,
/// returning exactly `days` buckets ending today, zero-filled where empty.
pub fn daily_usage(sessions: &[HistoricalSession], days: i64) -> Vec<DailyUsage> {
    let today = Local::now().date_naive();
    let mut buckets: HashMap<NaiveDate, TokenUsage> = HashMap::new();

    for session in sessions {
        let Some(last_event) = session.last_event_at else {
            continue;
        };
        let local_date = last_event.with_timezone(&Local).date_naive();
        buckets
            .entry(local_date)
            .or_default()
            .add(&session.timeline.token_totals);
    }

    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailyUsage {
                date,
                usage: buckets.get(&date).copied().unwrap_or_default(),
            }
        })
        .collect()
}

pub fn total_usage(sessions: &[HistoricalSession]) -> TokenUsage {
    let mut total = TokenUsage::default();
    for session in sessions {
        total.add(&session.timeline.token_totals);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{reconstruct, Timeline};
    use std::path::PathBuf;

    fn session_with(cwd: &str, last_event: chrono::DateTime<chrono::Utc>, tokens: TokenUsage) -> HistoricalSession {
        let mut timeline: Timeline = reconstruct(&[], false);
        timeline.token_totals = tokens;
        timeline.cwd = Some(cwd.to_string());
        HistoricalSession {
            id: "s".into(),
            file_path: PathBuf::from("/tmp/s.jsonl"),
            cwd: Some(cwd.to_string()),
            created_at: Some(last_event),
            last_event_at: Some(last_event),
            timeline,
        }
    }

    #[test]
    fn path_normalization_is_case_insensitive_and_strips_trailing_sep() {
        assert_eq!(normalize_path("/Users/me/Proj/"), normalize_path("/users/me/proj"));
    }

    #[test]
    fn project_totals_sum_only_matching_sessions() {
        let now = chrono::Utc::now();
        let tokens_a = TokenUsage { input_tokens: 10, cached_input_tokens: 0, output_tokens: 5, reasoning_output_tokens: 0 };
        let tokens_b = TokenUsage { input_tokens: 99, cached_input_tokens: 0, output_tokens: 1, reasoning_output_tokens: 0 };
        let sessions = vec![
            session_with("/work/proj", now, tokens_a),
            session_with("/work/other", now, tokens_b),
        ];
        let total = project_totals(&sessions, "/work/proj/");
        assert_eq!(total.input_tokens, 10);
    }

    #[test]
    fn daily_usage_zero_fills_empty_buckets() {
        let buckets = daily_usage(&[], 7);
        assert_eq!(buckets.len(), 7);
        assert!(buckets.iter().all(|b| b.usage.input_tokens == 0));
        assert_eq!(buckets.last().unwrap().date, Local::now().date_naive());
    }
}
