//! Progress events streamed to callers while a request runs.
//!
//! The gateway forwards these over SSE; the CLI prints them.
//!
//! - `step_started`    : a reasoning or acting phase began
//! - `action_requested`: the reasoning step asked for an action
//! - `action_completed`: an action finished (successfully or not), with a
//!   short preview of its output
//! - `content_chunk`   : text produced by the reasoning step
//! - `done`            : terminal: final answer
//! - `failed`          : terminal: the run could not complete

use serde::{Deserialize, Serialize};

/// Longest tool output excerpt carried by `action_completed`, in characters.
pub const PREVIEW_CHARS: usize = 200;

/// Compact JSON of an action payload, cut to [`PREVIEW_CHARS`] characters.
pub fn preview(payload: &serde_json::Value) -> String {
    let rendered = payload.to_string();
    match rendered.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => rendered[..cut].to_string(),
        None => rendered,
    }
}

/// Which phase of the loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Reasoning,
    Acting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A phase began. `round_trip` counts completed acting phases so far.
    StepStarted { step: StepKind, round_trip: u32 },

    ActionRequested {
        id: String,
        name: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },

    ActionCompleted {
        id: String,
        name: String,
        success: bool,
        preview: String,
    },

    ContentChunk { text: String },

    Done { text: String },

    Failed { reason: String },
}

impl ProgressEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::ActionRequested { .. } => "action_requested",
            Self::ActionCompleted { .. } => "action_completed",
            Self::ContentChunk { .. } => "content_chunk",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// `Done` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_step_started() {
        let event = ProgressEvent::StepStarted {
            step: StepKind::Acting,
            round_trip: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"step_started""#));
        assert!(json.contains(r#""step":"acting""#));
        assert!(json.contains(r#""round_trip":1"#));
    }

    #[test]
    fn event_serialization_action_requested() {
        let event = ProgressEvent::ActionRequested {
            id: "call_1".into(),
            name: "get_weather".into(),
            arguments: serde_json::json!({"location": "Tokyo"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"action_requested""#));
        assert!(json.contains(r#""location":"Tokyo""#));
    }

    #[test]
    fn event_type_matches_serde_tag() {
        let events = [
            ProgressEvent::ContentChunk { text: "x".into() },
            ProgressEvent::ActionCompleted {
                id: "a".into(),
                name: "b".into(),
                success: false,
                preview: String::new(),
            },
            ProgressEvent::Done { text: "ok".into() },
            ProgressEvent::Failed {
                reason: "cancelled".into(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
        }
    }

    #[test]
    fn terminal_events() {
        assert!(ProgressEvent::Done { text: String::new() }.is_terminal());
        assert!(ProgressEvent::Failed { reason: "x".into() }.is_terminal());
        assert!(!ProgressEvent::ContentChunk { text: "x".into() }.is_terminal());
    }

    #[test]
    fn preview_is_bounded_on_char_boundaries() {
        let short = serde_json::json!({"city": "Tokyo"});
        assert_eq!(preview(&short), r#"{"city":"Tokyo"}"#);

        let long = serde_json::json!({ "notes": "東京".repeat(300) });
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS);
        assert!(cut.starts_with(r#"{"notes":"東京"#));
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"content_chunk","text":"hi"}"#;
        let event: ProgressEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ProgressEvent::ContentChunk { text: "hi".into() });
    }
}
