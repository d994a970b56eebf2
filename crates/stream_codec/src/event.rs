use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exact prefix carried by event-bearing protocol lines.
pub const DATA_PREFIX: &str = "data: ";

/// One parsed unit of the streaming protocol.
///
/// The set is closed: `done` and `error` are terminal and no event after
/// either is applied to a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Thinking { data: String },
    Content { data: String },
    Done,
    Error { data: String },
}

impl StreamEvent {
    /// Returns true when no further events follow this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

/// Map one decoded line to an event.
///
/// Lines without the `data: ` prefix (blank lines, SSE comments,
/// keep-alives), lines whose payload is not valid JSON, and payloads with a
/// missing or unknown `type` all yield `None`. A single corrupt event must
/// not abort an otherwise-healthy stream.
#[must_use]
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let value: Value = serde_json::from_str(payload).ok()?;
    let event_type = value.get("type")?.as_str()?;
    let data = || {
        value
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    match event_type {
        "thinking" => Some(StreamEvent::Thinking { data: data() }),
        "content" => Some(StreamEvent::Content { data: data() }),
        "done" => Some(StreamEvent::Done),
        "error" => Some(StreamEvent::Error { data: data() }),
        _ => None,
    }
}
