//! Event normalization: one raw push event in, classified parts out.

use serde_json::{Map, Value};
use streamflow_traits::{InboundEvent, ToolMessage};
use tracing::warn;

use crate::info::parse_info;

const EPHEMERAL_KEY: &str = "ephemeral";
const TOOL_MESSAGE_KEY: &str = "toolMessage";

/// The classified parts of one inbound event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedEvent {
    /// Transport failure message; when set nothing else should be applied
    pub error: Option<String>,
    /// Sideband patch to merge into the session info
    pub info: Option<Map<String, Value>>,
    /// Whether this event's text belongs to the ephemeral buffer
    pub ephemeral: bool,
    pub tool_message: Option<ToolMessage>,
    /// Text to append
    pub delta: Option<String>,
    /// The event carried a non-empty raw result
    pub has_result: bool,
    /// The remote job reports completion
    pub completed: bool,
}

/// Classify a raw event. Malformed payloads degrade and are logged.
pub fn normalize(event: &InboundEvent) -> NormalizedEvent {
    if let Some(error) = &event.error {
        return NormalizedEvent {
            error: Some(error.clone()),
            ..NormalizedEvent::default()
        };
    }

    let mut normalized = NormalizedEvent {
        completed: event.is_complete(),
        ..NormalizedEvent::default()
    };

    if let Some(raw) = &event.info {
        let info = parse_info(raw).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding malformed info payload");
            Map::new()
        });
        normalized.ephemeral = info
            .get(EPHEMERAL_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        normalized.tool_message = info.get(TOOL_MESSAGE_KEY).and_then(|value| {
            serde_json::from_value::<ToolMessage>(value.clone())
                .map_err(|e| warn!(error = %e, "Discarding malformed toolMessage"))
                .ok()
        });
        normalized.info = Some(info);
    }

    if let Some(raw) = &event.data {
        normalized.has_result = !raw.is_empty();
        normalized.delta = Some(extract_delta(raw));
    }

    normalized
}

/// Pull the delta text out of a `result` payload.
///
/// Priority: a JSON string value, then `choices[0].delta.content`, then
/// `content`, then `message`. Anything else is used verbatim.
pub fn extract_delta(raw: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    if let Value::String(text) = &value {
        return text.clone();
    }
    let candidates = [
        value.pointer("/choices/0/delta/content"),
        value.get("content"),
        value.get("message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}
