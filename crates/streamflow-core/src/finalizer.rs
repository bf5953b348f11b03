//! Final message composition.

use streamflow_traits::{FinalMessage, MessageEnvelope};
use tokio::time::Instant;

use crate::session::StreamSession;

/// Build the record to persist from a drained session.
///
/// Closes any open thinking period at `now`. The payload falls back to the
/// ephemeral text when no persistent text arrived, so tool-only and
/// thinking-only turns are not lost.
pub fn compose_final_message(
    session: &mut StreamSession,
    envelope: MessageEnvelope,
    now: Instant,
    sent_time: i64,
) -> FinalMessage {
    let thinking_duration = session.thinking.finish(now);

    let payload = if session.persistent_text.is_empty() {
        session.ephemeral_text.clone()
    } else {
        session.persistent_text.clone()
    };

    let ephemeral_content = if !session.ephemeral_text.is_empty() || !session.tools.is_empty() {
        Some(session.ephemeral_text.clone())
    } else {
        None
    };

    let tool_calls = if session.tools.is_empty() {
        None
    } else {
        Some(session.tools.to_vec())
    };

    FinalMessage {
        payload,
        tool: session.info.to_json_string(),
        ephemeral_content,
        tool_calls,
        thinking_duration,
        is_streaming: false,
        sent_time,
        envelope,
    }
}
