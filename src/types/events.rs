//! Session events delivered by the client SDK during a turn

use serde::{Deserialize, Serialize};

/// A discrete notification emitted while a turn is in flight.
///
/// Events for one turn arrive in emission order and [`SessionEvent::Idle`] is
/// always the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Incremental assistant content
    #[serde(rename = "assistant.message_delta")]
    MessageDelta { content: String },

    /// Full assistant message for the turn
    #[serde(rename = "assistant.message")]
    Message { content: String },

    /// The model started invoking a registered tool
    #[serde(rename = "tool.execution_start")]
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
    },

    /// A tool invocation finished and its result was fed back
    #[serde(rename = "tool.execution_complete")]
    ToolExecutionComplete {
        tool_call_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },

    /// Session-level failure reported mid-turn
    #[serde(rename = "session.error")]
    Error { message: String },

    /// Turn complete
    #[serde(rename = "session.idle")]
    Idle,
}

impl SessionEvent {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionEvent::Idle)
    }

    /// Wire name of the event, as the SDK reports it.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::MessageDelta { .. } => "assistant.message_delta",
            SessionEvent::Message { .. } => "assistant.message",
            SessionEvent::ToolExecutionStart { .. } => "tool.execution_start",
            SessionEvent::ToolExecutionComplete { .. } => "tool.execution_complete",
            SessionEvent::Error { .. } => "session.error",
            SessionEvent::Idle => "session.idle",
        }
    }

    /// Delta text, if this is an incremental content event.
    pub fn delta(&self) -> Option<&str> {
        match self {
            SessionEvent::MessageDelta { content } => Some(content),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_sdk_wire_names() {
        let delta = SessionEvent::MessageDelta {
            content: "Hel".into(),
        };
        assert_eq!(
            serde_json::to_value(&delta).unwrap(),
            json!({"type": "assistant.message_delta", "content": "Hel"})
        );
        assert_eq!(
            serde_json::to_value(SessionEvent::Idle).unwrap(),
            json!({"type": "session.idle"})
        );
    }

    #[test]
    fn tool_completion_parses_without_result() {
        let event: SessionEvent = serde_json::from_value(json!({
            "type": "tool.execution_complete",
            "tool_call_id": "call-1",
            "success": false
        }))
        .unwrap();
        assert_eq!(event.kind(), "tool.execution_complete");
        assert!(!event.is_idle());
        assert_eq!(event.delta(), None);
    }
}
