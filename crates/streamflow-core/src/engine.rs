//! The stream consumption state machine.
//!
//! `StreamEngine` is synchronous and clock-injected: every operation takes
//! `now`, and side effects that need the outside world (unsubscribing,
//! persisting, publishing) are returned to the caller as outcomes. The async
//! `EngineRunner` drives it from one task.

use std::time::Duration;

use streamflow_traits::{FinalMessage, InboundEvent, StreamError, ToolMessage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classifier::normalize;
use crate::config::EngineConfig;
use crate::finalizer::compose_final_message;
use crate::scheduler::Dispatch;
use crate::session::{SessionStatus, StreamSession};
use crate::snapshot::LiveSnapshot;

/// A session ended by an error; the readout is frozen in place
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub error: StreamError,
    pub frozen: LiveSnapshot,
}

/// What applying one inbound event led to
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Stale request id or no streaming session
    Ignored,
    Applied,
    /// Remote completion accepted; persist once the queue drains
    FinalizeRequested,
    /// Transport error; the session is already reset
    Failed(Failure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was streaming
    Inactive,
    /// No content had arrived; session reset without persisting
    Cancelled,
    /// Content exists; it will be persisted once the queue drains
    Finalizing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchdogOutcome {
    /// Finalization already began or the session is gone
    Silent,
    TimedOut(Failure),
}

pub struct StreamEngine {
    config: EngineConfig,
    chat_id: String,
    session: StreamSession,
}

impl StreamEngine {
    pub fn new(config: EngineConfig, chat_id: impl Into<String>) -> Self {
        let session = StreamSession::new(&config);
        Self {
            config,
            chat_id: chat_id.into(),
            session,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn is_thinking(&self) -> bool {
        self.session.thinking.is_thinking()
    }

    /// Attach a new request. Returns the request id it superseded, if any.
    ///
    /// `timeout` overrides the configured inactivity window for this session.
    pub fn start(
        &mut self,
        request_id: &str,
        label: Option<String>,
        timeout: Option<Duration>,
        now: Instant,
    ) -> Option<String> {
        let superseded = if self.session.status() == SessionStatus::Idle {
            None
        } else {
            let previous = self.session.request_id.clone();
            info!(
                chat_id = %self.chat_id,
                previous = ?previous,
                request_id,
                "Superseding active stream session"
            );
            self.reset_session();
            previous
        };

        self.session.request_id = Some(request_id.to_string());
        self.session.label = label;
        if let Some(timeout) = timeout {
            self.session.watchdog.set_timeout(timeout);
        }
        // Fresh sessions are always Idle, so this cannot fail.
        let _ = self.session.transition(SessionStatus::Streaming);
        self.session.arm_watchdog(now);

        debug!(
            chat_id = %self.chat_id,
            request_id,
            timeout_secs = self.session.watchdog.timeout().as_secs(),
            "Stream session started"
        );
        superseded
    }

    /// Apply one inbound event addressed to `request_id`
    pub fn handle_event(
        &mut self,
        request_id: &str,
        event: &InboundEvent,
        now: Instant,
    ) -> EventOutcome {
        if !self.session.accepts(request_id) {
            debug!(
                chat_id = %self.chat_id,
                request_id,
                status = %self.session.status(),
                "Ignoring event for inactive request"
            );
            return EventOutcome::Ignored;
        }
        self.session.arm_watchdog(now);

        let normalized = normalize(event);
        if let Some(message) = normalized.error {
            return EventOutcome::Failed(self.fail(StreamError::Transport(message), now));
        }

        if let Some(info) = normalized.info {
            self.session.info.merge(info);
        }
        if let Some(tool_message) = normalized.tool_message {
            self.apply_tool_message(tool_message, now);
        }
        if let Some(delta) = normalized.delta {
            self.apply_delta(&delta, normalized.ephemeral, now);
        }
        if normalized.has_result {
            self.session.saw_result = true;
        }

        if normalized.completed {
            if !self.session.saw_result {
                debug!(
                    chat_id = %self.chat_id,
                    request_id,
                    "Completion without any result, waiting"
                );
                return EventOutcome::Applied;
            }
            if self.begin_finalize() {
                return EventOutcome::FinalizeRequested;
            }
        }
        EventOutcome::Applied
    }

    fn apply_tool_message(&mut self, message: ToolMessage, now: Instant) {
        match message {
            ToolMessage::Start {
                call_id,
                icon,
                user_message,
            } => {
                self.session.tools.start(&call_id, icon, user_message);
                if self.session.thinking.open(now) {
                    debug!(call_id, "Thinking period opened by tool start");
                }
            }
            ToolMessage::Finish {
                call_id,
                success,
                error,
            } => {
                let success = success.unwrap_or(error.is_none());
                self.session.tools.finish(&call_id, success, error);
            }
        }
    }

    fn apply_delta(&mut self, delta: &str, ephemeral: bool, now: Instant) {
        if !delta.is_empty() {
            if ephemeral {
                self.session.thinking.open(now);
            } else if let Some(secs) = self.session.thinking.close(now) {
                debug!(secs, "Thinking period closed by answer text");
            }
        }
        self.session.queue.enqueue(delta, ephemeral);
    }

    /// Take the finalization guard. False if another trigger got there first.
    fn begin_finalize(&mut self) -> bool {
        match self.session.transition(SessionStatus::Finalizing) {
            Ok(()) => {
                self.session.watchdog.disarm();
                debug!(
                    chat_id = %self.chat_id,
                    queued = self.session.queue.len(),
                    "Finalization requested"
                );
                true
            }
            Err(e) => {
                debug!(chat_id = %self.chat_id, error = %e, "Finalization already in progress");
                false
            }
        }
    }

    pub fn next_tick_at(&self, now: Instant) -> Option<Instant> {
        if !matches!(
            self.session.status(),
            SessionStatus::Streaming | SessionStatus::Finalizing
        ) {
            return None;
        }
        self.session.queue.next_tick_at(now)
    }

    /// Dispatch at most one chunk to its buffer
    pub fn tick(&mut self, now: Instant) -> Option<Dispatch> {
        if !matches!(
            self.session.status(),
            SessionStatus::Streaming | SessionStatus::Finalizing
        ) {
            return None;
        }
        let dispatch = self.session.queue.tick(now)?;
        self.session.apply_dispatch(&dispatch);
        Some(dispatch)
    }

    /// Whether a pending finalization can run now
    pub fn is_ready_to_finalize(&self) -> bool {
        self.session.status() == SessionStatus::Finalizing && self.session.queue.is_empty()
    }

    /// Move queued chunks straight into the buffers (skips the animation)
    pub fn flush_pending(&mut self) {
        self.session.flush_queue();
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.session.watchdog.deadline()
    }

    pub fn watchdog_fired(&mut self, now: Instant) -> WatchdogOutcome {
        if self.session.status() != SessionStatus::Streaming {
            self.session.watchdog.disarm();
            debug!(
                chat_id = %self.chat_id,
                status = %self.session.status(),
                "Watchdog fired after completion, cleaning up silently"
            );
            return WatchdogOutcome::Silent;
        }
        let timeout_secs = self.session.watchdog.timeout().as_secs();
        WatchdogOutcome::TimedOut(self.fail(StreamError::Timeout { timeout_secs }, now))
    }

    /// User-confirmed stop
    pub fn stop(&mut self) -> StopOutcome {
        match self.session.status() {
            SessionStatus::Idle => StopOutcome::Inactive,
            SessionStatus::Finalizing | SessionStatus::Done => StopOutcome::Finalizing,
            SessionStatus::Streaming => {
                if self.session.has_content() && self.begin_finalize() {
                    info!(
                        chat_id = %self.chat_id,
                        request_id = ?self.session.request_id,
                        "Stream stopped by user, keeping received content"
                    );
                    StopOutcome::Finalizing
                } else {
                    info!(
                        chat_id = %self.chat_id,
                        request_id = ?self.session.request_id,
                        "Stream stopped by user before any content"
                    );
                    self.reset_session();
                    StopOutcome::Cancelled
                }
            }
        }
    }

    /// End the session with an error, freezing the readout
    pub fn fail(&mut self, error: StreamError, now: Instant) -> Failure {
        warn!(
            chat_id = %self.chat_id,
            request_id = ?self.session.request_id,
            error = %error,
            "Stream session failed"
        );
        let frozen = self.snapshot(now).frozen(error.to_string());
        self.reset_session();
        Failure { error, frozen }
    }

    /// Compose the final message once the queue has drained.
    ///
    /// Returns `Some` at most once per session: the `Finalizing → Done`
    /// transition is the exactly-once guard.
    pub fn take_final_message(&mut self, now: Instant) -> Option<FinalMessage> {
        if !self.is_ready_to_finalize() {
            return None;
        }
        self.session.transition(SessionStatus::Done).ok()?;
        let envelope = self.config.envelope_for(&self.chat_id);
        let sent_time = chrono::Utc::now().timestamp_millis();
        Some(compose_final_message(
            &mut self.session,
            envelope,
            now,
            sent_time,
        ))
    }

    /// Clear all session state back to idle
    pub fn reset_session(&mut self) {
        self.session = StreamSession::new(&self.config);
    }

    pub fn snapshot(&self, now: Instant) -> LiveSnapshot {
        let session = &self.session;
        LiveSnapshot {
            request_id: session.request_id.clone(),
            label: session.label.clone(),
            is_streaming: matches!(
                session.status(),
                SessionStatus::Streaming | SessionStatus::Finalizing
            ),
            is_loading: session.is_loading(),
            is_thinking: session.thinking.is_thinking(),
            streaming_content: session.persistent_text.clone(),
            ephemeral_content: session.ephemeral_text.clone(),
            tool_calls: session.tools.to_vec(),
            thinking_duration: session.thinking.live_secs(now),
            error: None,
        }
    }
}
