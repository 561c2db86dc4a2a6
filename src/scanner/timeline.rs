use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::{token_usage_from_value, Record, RecordKind, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Tool,
    Think,
    Gen,
    Waiting,
}

#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub kind: SpanKind,
    pub duration_ms: i64,
    pub token_count: u64,
    pub event_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub spans: Vec<Span>,
    pub duration_ms: i64,
    pub event_counts: HashMap<String, u64>,
    pub token_totals: TokenUsage,
    pub partial: bool,
    pub cwd: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Idle,
    Tool,
    Think,
    Gen,
}

impl Activity {
    fn span_kind_for_idle_close(self) -> SpanKind {
        match self {
            Activity::Tool => SpanKind::Tool,
            Activity::Think => SpanKind::Think,
            Activity::Gen => SpanKind::Gen,
            Activity::Idle => SpanKind::Waiting,
        }
    }
}

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::SessionMeta => "session-meta",
        RecordKind::Message => "message",
        RecordKind::FunctionCall => "function-call",
        RecordKind::FunctionResult => "function-result",
        RecordKind::AgentReasoningStart => "agent-reasoning-start",
        RecordKind::AgentReasoningEnd => "agent-reasoning-end",
        RecordKind::GenerationStart => "generation-start",
        RecordKind::GenerationEnd => "generation-end",
        RecordKind::TokenCount => "token-count",
        RecordKind::Other => "other",
    }
}

/// Reconstructs a timeline from already chronologically-sorted records per
/// the tool/think/gen/waiting span algorithm: closes the prior span whenever
/// activity changes, coalesces nested starts of the same activity (the
/// outermost wins), and accumulates token-count snapshots into both the
/// running totals and the currently open think/gen span.
pub fn reconstruct(records: &[Record], partial: bool) -> Timeline {
    let mut event_counts: HashMap<String, u64> = HashMap::new();
    let mut token_totals = TokenUsage::default();
    let mut spans = Vec::new();
    let mut cwd = None;
    let mut created_at = None;
    let mut last_event_at = None;

    if records.is_empty() {
        return Timeline {
            spans,
            duration_ms: 0,
            event_counts,
            token_totals,
            partial,
            cwd,
            created_at,
            last_event_at,
        };
    }

    let first_ts = records[0].ts;
    // `cursor` tracks the last processed event's time (for clamping and the
    // overall duration); `span_start` tracks where the currently open span
    // began, which only moves when the activity actually changes.
    let mut cursor = first_ts;
    let mut span_start = first_ts;
    let mut activity = Activity::Idle;
    let mut depth: u32 = 0;
    let mut open_span_tokens: u64 = 0;
    let mut open_span_events: u64 = 0;

    let push_span = |spans: &mut Vec<Span>, kind: SpanKind, from: DateTime<Utc>, to: DateTime<Utc>, tokens: u64, events: u64| {
        let duration_ms = (to - from).num_milliseconds();
        if duration_ms > 0 {
            spans.push(Span {
                kind,
                duration_ms,
                token_count: tokens,
                event_count: events,
            });
        }
    };

    for record in records {
        let mut event_ts = record.ts;
        if event_ts < cursor {
            event_ts = cursor;
        }

        *event_counts.entry(kind_label(record.kind).to_string()).or_insert(0) += 1;
        last_event_at = Some(event_ts);
        open_span_events += 1;

        match record.kind {
            RecordKind::SessionMeta => {
                cwd = record
                    .raw
                    .get("cwd")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                created_at = Some(event_ts);
            }
            RecordKind::FunctionCall | RecordKind::AgentReasoningStart | RecordKind::GenerationStart => {
                let target = match record.kind {
                    RecordKind::FunctionCall => Activity::Tool,
                    RecordKind::AgentReasoningStart => Activity::Think,
                    _ => Activity::Gen,
                };
                if activity == Activity::Idle {
                    push_span(
                        &mut spans,
                        Activity::Idle.span_kind_for_idle_close(),
                        span_start,
                        event_ts,
                        0,
                        open_span_events - 1,
                    );
                    activity = target;
                    depth = 1;
                    span_start = event_ts;
                    open_span_tokens = 0;
                    open_span_events = 1;
                } else if activity == target {
                    depth += 1;
                }
                // else: a different activity is already open — outermost
                // wins, this start only contributed to the counters above.
            }
            RecordKind::FunctionResult | RecordKind::AgentReasoningEnd | RecordKind::GenerationEnd => {
                let target = match record.kind {
                    RecordKind::FunctionResult => Activity::Tool,
                    RecordKind::AgentReasoningEnd => Activity::Think,
                    _ => Activity::Gen,
                };
                if activity == target {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        push_span(
                            &mut spans,
                            activity.span_kind_for_idle_close(),
                            span_start,
                            event_ts,
                            open_span_tokens,
                            open_span_events,
                        );
                        activity = Activity::Idle;
                        span_start = event_ts;
                        open_span_tokens = 0;
                        open_span_events = 0;
                    }
                }
            }
            RecordKind::TokenCount => {
                let usage = token_usage_from_value(&record.raw);
                token_totals.add(&usage);
                if matches!(activity, Activity::Think | Activity::Gen) {
                    open_span_tokens += usage.input_tokens
                        + usage.cached_input_tokens
                        + usage.output_tokens
                        + usage.reasoning_output_tokens;
                }
            }
            RecordKind::Message | RecordKind::Other => {}
        }

        cursor = event_ts;
    }

    // Close whatever is still open at EOF, to the last event's timestamp.
    push_span(
        &mut spans,
        activity.span_kind_for_idle_close(),
        span_start,
        cursor,
        open_span_tokens,
        open_span_events,
    );

    let duration_ms = (cursor - first_ts).num_milliseconds();

    Timeline {
        spans,
        duration_ms,
        event_counts,
        token_totals,
        partial,
        cwd,
        created_at,
        last_event_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::record::parse_line;

    fn lines() -> Vec<&'static str> {
        vec![
            r#"{"ts":"2026-01-01T00:00:00Z","kind":"session-meta","cwd":"/w"}"#,
            r#"{"ts":"2026-01-01T00:00:01Z","kind":"function-call"}"#,
            r#"{"ts":"2026-01-01T00:00:03Z","kind":"function-result"}"#,
            r#"{"ts":"2026-01-01T00:00:03Z","kind":"generation-start"}"#,
            r#"{"ts":"2026-01-01T00:00:04Z","kind":"token-count","input":10,"output":20}"#,
            r#"{"ts":"2026-01-01T00:00:05Z","kind":"generation-end"}"#,
        ]
    }

    #[test]
    fn reconstructs_spans_per_the_worked_example() {
        let records: Vec<Record> = lines()
            .iter()
            .enumerate()
            .map(|(i, l)| parse_line(l, i).unwrap())
            .collect();
        let timeline = reconstruct(&records, false);

        assert_eq!(timeline.duration_ms, 5000);
        assert_eq!(timeline.spans.len(), 3);
        assert_eq!(timeline.spans[0].kind, SpanKind::Waiting);
        assert_eq!(timeline.spans[0].duration_ms, 1000);
        assert_eq!(timeline.spans[1].kind, SpanKind::Tool);
        assert_eq!(timeline.spans[1].duration_ms, 2000);
        assert_eq!(timeline.spans[2].kind, SpanKind::Gen);
        assert_eq!(timeline.spans[2].duration_ms, 2000);
        assert_eq!(timeline.spans[2].token_count, 30);
        assert_eq!(timeline.token_totals.input_tokens, 10);
        assert_eq!(timeline.token_totals.output_tokens, 20);
    }

    #[test]
    fn span_durations_sum_to_total_duration() {
        let records: Vec<Record> = lines()
            .iter()
            .enumerate()
            .map(|(i, l)| parse_line(l, i).unwrap())
            .collect();
        let timeline = reconstruct(&records, false);
        let sum: i64 = timeline.spans.iter().map(|s| s.duration_ms).sum();
        assert_eq!(sum, timeline.duration_ms);
    }

    #[test]
    fn empty_input_yields_empty_timeline() {
        let timeline = reconstruct(&[], false);
        assert_eq!(timeline.duration_ms, 0);
        assert!(timeline.spans.is_empty());
    }
}
