//! Live readouts published to the hosting UI.

use serde::Serialize;
use streamflow_traits::ToolCallEntry;

/// What the UI renders for the chat's in-flight response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub request_id: Option<String>,
    /// Label shown before any content arrives
    pub label: Option<String>,
    pub is_streaming: bool,
    pub is_loading: bool,
    pub is_thinking: bool,
    pub streaming_content: String,
    pub ephemeral_content: String,
    pub tool_calls: Vec<ToolCallEntry>,
    /// Live thinking seconds (accumulated plus the open period)
    pub thinking_duration: u64,
    /// Last user-visible failure
    pub error: Option<String>,
}

impl LiveSnapshot {
    /// Idle readout carrying a failure message
    pub fn idle_with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Stop the readout in place: content kept, activity flags cleared
    pub fn frozen(mut self, error: impl Into<String>) -> Self {
        self.is_streaming = false;
        self.is_loading = false;
        self.is_thinking = false;
        self.error = Some(error.into());
        self
    }
}
