//! Streaming support for backend chat responses
//!
//! The backend streams replies as Server-Sent Events. [`sse_parser`] turns
//! bytes into frames; [`parse_frame`] turns one frame into a typed
//! [`StreamEvent`], dropping anything outside the wire contract.

pub mod sse_parser;

pub use sse_parser::FrameDecoder;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::messages::Message;

/// A typed event decoded from one SSE frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Session assignment for this exchange
    Meta(MetaData),

    /// Incremental text fragment for the in-flight assistant message
    Delta(DeltaData),

    /// Terminal success carrying the fully-formed message
    Done(DoneData),

    /// Terminal failure reported by the backend
    Error(ErrorData),
}

/// Payload of a `meta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    pub session_id: String,
    pub message_id: String,
}

/// Payload of a `delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaData {
    pub delta: String,
}

/// Payload of a `done` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoneData {
    pub message: Message,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
}

/// Payload of an `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: String,
}

/// Map one complete frame to a typed event
///
/// Extracts the event name from the `event:` line and the payload from the
/// `data:` lines (multiple `data:` lines are joined with newline, per SSE
/// convention). Frames missing either part, naming an unknown event, or
/// carrying an unparseable payload yield `None`; keep-alives and
/// forward-compatible events are protocol no-ops, not errors.
#[must_use]
pub fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let mut event_name: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    // str::lines strips the \r of CRLF endings.
    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event_name = Some(value);
        } else if let Some(value) = field_value(line, "data") {
            data_lines.push(value);
        }
    }

    let name = event_name?;
    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");

    let parsed = match name {
        "meta" => serde_json::from_str(&data).map(StreamEvent::Meta),
        "delta" => serde_json::from_str(&data).map(StreamEvent::Delta),
        "done" => serde_json::from_str(&data).map(StreamEvent::Done),
        "error" => serde_json::from_str(&data).map(StreamEvent::Error),
        other => {
            trace!("Ignoring unknown SSE event type: {other}");
            return None;
        }
    };

    match parsed {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Dropping {name} event with unparseable payload: {e}");
            None
        }
    }
}

/// Extract the value of `field: value` lines, tolerating a missing space
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_meta_event() {
        let frame = "event: meta\ndata: {\"session_id\":\"s1\",\"message_id\":\"m1\"}";
        let event = parse_frame(frame).unwrap();
        assert_eq!(
            event,
            StreamEvent::Meta(MetaData {
                session_id: "s1".to_string(),
                message_id: "m1".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_delta_event() {
        let event = parse_frame("event: delta\ndata: {\"delta\":\"He\"}").unwrap();
        assert_eq!(event, StreamEvent::Delta(DeltaData { delta: "He".to_string() }));
    }

    #[test]
    fn test_parse_done_event() {
        let frame = concat!(
            "event: done\n",
            "data: {\"message\":{\"id\":\"m1\",\"role\":\"assistant\",",
            "\"content\":\"Hi there\",\"timestamp\":\"12:00\"},\"session_id\":\"s1\"}",
        );
        match parse_frame(frame).unwrap() {
            StreamEvent::Done(done) => {
                assert_eq!(done.message.content, "Hi there");
                assert_eq!(done.session_id, "s1");
                assert_eq!(done.parsed, None);
            }
            other => panic!("Expected done event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse_frame("event: error\ndata: {\"error\":\"boom\"}").unwrap();
        assert_eq!(event, StreamEvent::Error(ErrorData { error: "boom".to_string() }));
    }

    #[test]
    fn test_multiple_data_lines_join_with_newline() {
        // JSON split across two data: lines reassembles before parsing.
        let frame = "event: delta\ndata: {\"delta\":\ndata: \"hi\"}";
        let event = parse_frame(frame).unwrap();
        assert_eq!(event, StreamEvent::Delta(DeltaData { delta: "hi".to_string() }));
    }

    #[test]
    fn test_frame_without_event_name_is_dropped() {
        assert_eq!(parse_frame("data: {\"delta\":\"hi\"}"), None);
    }

    #[test]
    fn test_frame_without_data_is_dropped() {
        assert_eq!(parse_frame("event: delta"), None);
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        assert_eq!(parse_frame("event: heartbeat\ndata: {}"), None);
    }

    #[test]
    fn test_unparseable_payload_is_dropped() {
        assert_eq!(parse_frame("event: delta\ndata: not-json"), None);
    }

    #[test]
    fn test_comment_lines_are_ignored() {
        let frame = ": keep-alive\nevent: delta\ndata: {\"delta\":\"x\"}";
        assert!(parse_frame(frame).is_some());
    }

    #[test]
    fn test_crlf_line_endings_tolerated() {
        let frame = "event: delta\r\ndata: {\"delta\":\"x\"}\r";
        assert!(parse_frame(frame).is_some());
    }

    #[test]
    fn test_missing_space_after_colon() {
        let frame = "event:delta\ndata:{\"delta\":\"x\"}";
        assert!(parse_frame(frame).is_some());
    }
}
