//! Wire and record types shared by the engine and its collaborators.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single push event delivered by the transport for one request.
///
/// `progress == 1` signals remote-side completion, not local drain completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Remote job progress in `[0, 1]`
    #[serde(default)]
    pub progress: f64,
    /// Delta payload, either plain text or a JSON document carrying the text
    #[serde(default, alias = "result")]
    pub data: Option<String>,
    /// Sideband info, either a JSON object or a string containing one
    #[serde(default)]
    pub info: Option<Value>,
    /// Populated when the remote job failed
    #[serde(default)]
    pub error: Option<String>,
}

impl InboundEvent {
    /// Create an event carrying a delta payload
    pub fn data(progress: f64, data: impl Into<String>) -> Self {
        Self {
            progress,
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Create an event carrying only sideband info
    pub fn info(progress: f64, info: Value) -> Self {
        Self {
            progress,
            info: Some(info),
            ..Self::default()
        }
    }

    /// Create a failure event
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach sideband info to this event
    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    /// Whether the remote job reports completion
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Tool lifecycle notification carried in `info.toolMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolMessage {
    #[serde(rename = "start", rename_all = "camelCase")]
    Start {
        call_id: String,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        user_message: Option<String>,
    },
    #[serde(rename = "finish", rename_all = "camelCase")]
    Finish {
        call_id: String,
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl ToolMessage {
    pub fn call_id(&self) -> &str {
        match self {
            ToolMessage::Start { call_id, .. } | ToolMessage::Finish { call_id, .. } => call_id,
        }
    }
}

/// Status of a tracked tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    /// Tool is running
    Thinking,
    /// Tool finished successfully
    Completed,
    /// Tool finished with a failure
    Failed,
}

/// Lifecycle record of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A tool record keyed by its call id, as exposed to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEntry {
    pub call_id: String,
    #[serde(flatten)]
    pub record: ToolCallRecord,
}

/// Chat-history envelope fields attached to every persisted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub sender: String,
    pub direction: String,
    pub position: String,
    pub entity_id: String,
}

/// The message record written to chat history.
///
/// While a response is in flight the history holds a placeholder of this
/// shape with `is_streaming == true`; finalization replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMessage {
    pub payload: String,
    /// Serialized accumulated sideband info, citations included
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallEntry>>,
    /// Whole seconds spent in thinking periods
    #[serde(default)]
    pub thinking_duration: u64,
    #[serde(default)]
    pub is_streaming: bool,
    /// Unix ms
    pub sent_time: i64,
    #[serde(flatten)]
    pub envelope: MessageEnvelope,
}

impl FinalMessage {
    /// Create the in-flight placeholder shown until the response is finalized
    pub fn placeholder(label: impl Into<String>, envelope: MessageEnvelope) -> Self {
        Self {
            payload: label.into(),
            tool: "{}".to_string(),
            ephemeral_content: None,
            tool_calls: None,
            thinking_duration: 0,
            is_streaming: true,
            sent_time: chrono::Utc::now().timestamp_millis(),
            envelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope {
            sender: "assistant".into(),
            direction: "incoming".into(),
            position: "single".into(),
            entity_id: "chat-1".into(),
        }
    }

    #[test]
    fn test_event_accepts_result_alias() {
        let event: InboundEvent =
            serde_json::from_value(json!({"progress": 0.5, "result": "hi"})).unwrap();
        assert_eq!(event.data.as_deref(), Some("hi"));
        assert!(!event.is_complete());
    }

    #[test]
    fn test_event_defaults() {
        let event: InboundEvent = serde_json::from_value(json!({})).unwrap();
        assert_eq!(event, InboundEvent::default());
    }

    #[test]
    fn test_tool_message_start() {
        let msg: ToolMessage = serde_json::from_value(json!({
            "type": "start",
            "callId": "c1",
            "icon": "search",
            "userMessage": "Searching"
        }))
        .unwrap();
        match msg {
            ToolMessage::Start {
                call_id,
                icon,
                user_message,
            } => {
                assert_eq!(call_id, "c1");
                assert_eq!(icon.as_deref(), Some("search"));
                assert_eq!(user_message.as_deref(), Some("Searching"));
            }
            _ => panic!("Expected Start"),
        }
    }

    #[test]
    fn test_tool_message_finish_minimal() {
        let msg: ToolMessage =
            serde_json::from_value(json!({"type": "finish", "callId": "c1"})).unwrap();
        assert_eq!(msg.call_id(), "c1");
        assert!(matches!(
            msg,
            ToolMessage::Finish {
                success: None,
                error: None,
                ..
            }
        ));
    }

    #[test]
    fn test_final_message_wire_shape() {
        let msg = FinalMessage {
            payload: "answer".into(),
            tool: "{}".into(),
            ephemeral_content: None,
            tool_calls: None,
            thinking_duration: 3,
            is_streaming: false,
            sent_time: 42,
            envelope: envelope(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["thinkingDuration"], 3);
        assert_eq!(value["isStreaming"], false);
        assert_eq!(value["entityId"], "chat-1");
        assert!(value["toolCalls"].is_null());
        assert!(value.get("ephemeralContent").is_none());
    }

    #[test]
    fn test_placeholder_is_streaming() {
        let msg = FinalMessage::placeholder("Thinking...", envelope());
        assert!(msg.is_streaming);
        assert_eq!(msg.payload, "Thinking...");
    }
}
