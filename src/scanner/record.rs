use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// The semantic event kinds recognized in an archive line. Wire names are an
/// implementation choice (see the `kind` field of the concrete JSONL shape);
/// anything else collapses to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    SessionMeta,
    Message,
    FunctionCall,
    FunctionResult,
    AgentReasoningStart,
    AgentReasoningEnd,
    GenerationStart,
    GenerationEnd,
    TokenCount,
    Other,
}

impl RecordKind {
    fn from_wire(kind: &str) -> Self {
        match kind {
            "session-meta" => RecordKind::SessionMeta,
            "message" => RecordKind::Message,
            "function-call" => RecordKind::FunctionCall,
            "function-result" => RecordKind::FunctionResult,
            "agent-reasoning-start" => RecordKind::AgentReasoningStart,
            "agent-reasoning-end" => RecordKind::AgentReasoningEnd,
            "generation-start" => RecordKind::GenerationStart,
            "generation-end" => RecordKind::GenerationEnd,
            "token-count" => RecordKind::TokenCount,
            _ => RecordKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub ts: DateTime<Utc>,
    pub kind: RecordKind,
    /// File order, used as the tie-break for events sharing a timestamp.
    pub order: usize,
    pub raw: Value,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_output_tokens += other.reasoning_output_tokens;
    }
}

pub fn token_usage_from_value(value: &Value) -> TokenUsage {
    TokenUsage {
        input_tokens: value.get("input").and_then(|v| v.as_u64()).unwrap_or(0),
        cached_input_tokens: value
            .get("cached_input")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        output_tokens: value.get("output").and_then(|v| v.as_u64()).unwrap_or(0),
        reasoning_output_tokens: value
            .get("reasoning_output")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    }
}

/// Parse one archive line. `Ok(None)` means the line is valid JSON but not
/// a recognizable record (never happens here — unknown `kind` becomes
/// `Other`). `Err` means the line failed to parse at all, which the caller
/// must treat as a partial-file marker, not a skip.
pub fn parse_line(line: &str, order: usize) -> Result<Record, ()> {
    let value: Value = serde_json::from_str(line).map_err(|_| ())?;
    let ts = value
        .get("ts")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(())?;
    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .map(RecordKind::from_wire)
        .unwrap_or(RecordKind::Other);

    Ok(Record {
        ts,
        kind,
        order,
        raw: value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_kinds() {
        let line = r#"{"ts":"2026-01-01T00:00:00Z","kind":"function-call"}"#;
        let record = parse_line(line, 0).unwrap();
        assert_eq!(record.kind, RecordKind::FunctionCall);
    }

    #[test]
    fn unknown_kind_becomes_other() {
        let line = r#"{"ts":"2026-01-01T00:00:00Z","kind":"something-new"}"#;
        let record = parse_line(line, 0).unwrap();
        assert_eq!(record.kind, RecordKind::Other);
    }

    #[test]
    fn broken_json_is_an_error_not_a_skip() {
        assert!(parse_line("{not json", 0).is_err());
    }

    #[test]
    fn missing_timestamp_is_an_error() {
        let line = r#"{"kind":"message"}"#;
        assert!(parse_line(line, 0).is_err());
    }
}
