//! Per-session state owned by one engine instance.

use std::fmt;

use streamflow_traits::{Result, StreamError};
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::info::AccumulatedInfo;
use crate::scheduler::{ChunkScheduler, Dispatch};
use crate::thinking::ThinkingClock;
use crate::tools::ToolCallTracker;
use crate::watchdog::Watchdog;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No request attached
    #[default]
    Idle,
    /// Events are being consumed
    Streaming,
    /// Completion accepted, waiting for the chunk queue to drain
    Finalizing,
    /// Final message handed to persistence, reset pending
    Done,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Finalizing => "finalizing",
            SessionStatus::Done => "done",
        }
    }

    /// Legal forward transitions. Returning to `Idle` goes through reset.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Idle, SessionStatus::Streaming)
                | (SessionStatus::Streaming, SessionStatus::Finalizing)
                | (SessionStatus::Finalizing, SessionStatus::Done)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable record for the request currently attached to a chat
#[derive(Debug)]
pub struct StreamSession {
    pub(crate) request_id: Option<String>,
    pub(crate) label: Option<String>,
    status: SessionStatus,
    pub(crate) persistent_text: String,
    pub(crate) ephemeral_text: String,
    pub(crate) info: AccumulatedInfo,
    pub(crate) tools: ToolCallTracker,
    pub(crate) thinking: ThinkingClock,
    pub(crate) queue: ChunkScheduler,
    pub(crate) watchdog: Watchdog,
    /// A non-empty result has been seen in this session
    pub(crate) saw_result: bool,
}

impl StreamSession {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            request_id: None,
            label: None,
            status: SessionStatus::Idle,
            persistent_text: String::new(),
            ephemeral_text: String::new(),
            info: AccumulatedInfo::new(),
            tools: ToolCallTracker::new(),
            thinking: ThinkingClock::new(),
            queue: ChunkScheduler::new(
                config.max_chunk_chars,
                config.min_tick_interval(),
                config.frame_interval(),
            ),
            watchdog: Watchdog::new(config.watchdog_timeout()),
            saw_result: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn persistent_text(&self) -> &str {
        &self.persistent_text
    }

    pub fn ephemeral_text(&self) -> &str {
        &self.ephemeral_text
    }

    pub fn info(&self) -> &AccumulatedInfo {
        &self.info
    }

    pub fn tools(&self) -> &ToolCallTracker {
        &self.tools
    }

    pub fn thinking(&self) -> &ThinkingClock {
        &self.thinking
    }

    pub fn queue(&self) -> &ChunkScheduler {
        &self.queue
    }

    pub fn is_streaming(&self) -> bool {
        self.status == SessionStatus::Streaming
    }

    /// Active from start until reset: the chat's loading indicator
    pub fn is_loading(&self) -> bool {
        self.status != SessionStatus::Idle
    }

    /// Finalization has begun (or finished) for this session
    pub fn is_completing(&self) -> bool {
        matches!(self.status, SessionStatus::Finalizing | SessionStatus::Done)
    }

    /// Whether events for `request_id` should be applied
    pub fn accepts(&self, request_id: &str) -> bool {
        self.status == SessionStatus::Streaming && self.request_id.as_deref() == Some(request_id)
    }

    /// Whether anything worth persisting has been received
    pub fn has_content(&self) -> bool {
        !self.persistent_text.is_empty()
            || !self.ephemeral_text.is_empty()
            || self.queue.has_pending_text()
    }

    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(StreamError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Append a dispatched chunk to its display buffer
    pub(crate) fn apply_dispatch(&mut self, dispatch: &Dispatch) {
        if dispatch.chunk.ephemeral {
            self.ephemeral_text.push_str(&dispatch.chunk.text);
        } else {
            self.persistent_text.push_str(&dispatch.chunk.text);
        }
    }

    /// Move every queued chunk into the buffers at once
    pub(crate) fn flush_queue(&mut self) {
        for chunk in self.queue.drain_all() {
            if chunk.ephemeral {
                self.ephemeral_text.push_str(&chunk.text);
            } else {
                self.persistent_text.push_str(&chunk.text);
            }
        }
    }

    pub(crate) fn arm_watchdog(&mut self, now: Instant) {
        self.watchdog.arm(now);
    }
}
