//! Async driver for [`StreamEngine`].
//!
//! One task owns the engine and is its only mutator. It multiplexes the
//! command mailbox, the active subscription, the scheduler tick, the
//! watchdog deadline and the live readout in a single `select!` loop.

use std::sync::Arc;
use std::time::Duration;

use streamflow_traits::{
    CommitOutcome, FinalMessage, InboundEvent, MessageStore, Result, StreamError,
    StreamTransport, Subscription,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::{EventOutcome, Failure, StopOutcome, StreamEngine, WatchdogOutcome};
use crate::session::SessionStatus;
use crate::snapshot::LiveSnapshot;

const COMMAND_BUFFER: usize = 32;

/// Messages accepted by the runner's mailbox
#[derive(Debug)]
pub enum EngineCommand {
    Start {
        request_id: String,
        label: Option<String>,
        timeout: Option<Duration>,
        ack: oneshot::Sender<Result<()>>,
    },
    Stop {
        ack: oneshot::Sender<StopOutcome>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Session outcomes reported to the host
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    Finalized {
        request_id: Option<String>,
        message: FinalMessage,
        outcome: CommitOutcome,
    },
    Failed {
        request_id: Option<String>,
        error: StreamError,
    },
    Cancelled {
        request_id: Option<String>,
    },
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<EngineNotice>;

/// Cloneable control surface for a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: watch::Receiver<LiveSnapshot>,
}

impl EngineHandle {
    /// Attach `request_id` using the configured inactivity window
    pub async fn start(&self, request_id: impl Into<String>, label: Option<String>) -> Result<()> {
        self.send_start(request_id.into(), label, None).await
    }

    /// Attach `request_id` with a caller-chosen inactivity window
    pub async fn start_with_timeout(
        &self,
        request_id: impl Into<String>,
        label: Option<String>,
        timeout: Duration,
    ) -> Result<()> {
        self.send_start(request_id.into(), label, Some(timeout)).await
    }

    async fn send_start(
        &self,
        request_id: String,
        label: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(EngineCommand::Start {
                request_id,
                label,
                timeout,
                ack,
            })
            .await
            .map_err(|_| StreamError::EngineClosed)?;
        done.await.map_err(|_| StreamError::EngineClosed)?
    }

    /// Begin a stop. Nothing happens until the request is confirmed.
    pub fn request_stop(&self) -> StopRequest {
        StopRequest {
            commands: self.commands.clone(),
        }
    }

    /// Tear the runner down, persisting any received content first
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(EngineCommand::Shutdown { ack })
            .await
            .map_err(|_| StreamError::EngineClosed)?;
        done.await.map_err(|_| StreamError::EngineClosed)
    }

    /// Latest published readout
    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<LiveSnapshot> {
        self.snapshots.clone()
    }
}

/// A pending user stop. Dropping it cancels the stop.
#[must_use = "a stop request does nothing until confirmed"]
pub struct StopRequest {
    commands: mpsc::Sender<EngineCommand>,
}

impl StopRequest {
    pub async fn confirm(self) -> Result<StopOutcome> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(EngineCommand::Stop { ack })
            .await
            .map_err(|_| StreamError::EngineClosed)?;
        done.await.map_err(|_| StreamError::EngineClosed)
    }
}

enum Step {
    Command(EngineCommand),
    Event(String, Option<InboundEvent>),
    Tick,
    Watchdog,
    Readout,
    /// Every handle was dropped
    Closed,
}

pub struct EngineRunner {
    engine: StreamEngine,
    transport: Arc<dyn StreamTransport>,
    store: Arc<dyn MessageStore>,
    commands: mpsc::Receiver<EngineCommand>,
    subscription: Option<Subscription>,
    snapshots: watch::Sender<LiveSnapshot>,
    notices: mpsc::UnboundedSender<EngineNotice>,
    /// Readout kept on screen after a failure until the next start
    frozen: Option<LiveSnapshot>,
}

impl EngineRunner {
    /// Spawn the runner task for one chat
    pub fn spawn(
        config: EngineConfig,
        chat_id: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
        store: Arc<dyn MessageStore>,
    ) -> Result<(EngineHandle, NoticeReceiver)> {
        config.validate()?;
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots, snapshot_rx) = watch::channel(LiveSnapshot::default());
        let (notices, notice_rx) = mpsc::unbounded_channel();

        let runner = Self {
            engine: StreamEngine::new(config, chat_id),
            transport,
            store,
            commands,
            subscription: None,
            snapshots,
            notices,
            frozen: None,
        };
        tokio::spawn(runner.run());

        Ok((
            EngineHandle {
                commands: commands_tx,
                snapshots: snapshot_rx,
            },
            notice_rx,
        ))
    }

    async fn run(mut self) {
        let mut readout = tokio::time::interval(self.engine.config().readout_interval());
        readout.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(chat_id = %self.engine.chat_id(), "Engine runner started");

        loop {
            let now = Instant::now();
            let tick_at = self.engine.next_tick_at(now);
            let watchdog_at = self.engine.watchdog_deadline();
            let thinking = self.engine.is_thinking();

            let step = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Closed,
                },
                (request_id, event) = next_event(&mut self.subscription) => {
                    Step::Event(request_id, event)
                }
                _ = sleep_until_opt(tick_at) => Step::Tick,
                _ = sleep_until_opt(watchdog_at) => Step::Watchdog,
                _ = readout.tick(), if thinking => Step::Readout,
            };

            match step {
                Step::Command(EngineCommand::Start {
                    request_id,
                    label,
                    timeout,
                    ack,
                }) => {
                    let result = self.handle_start(request_id, label, timeout).await;
                    let _ = ack.send(result);
                }
                Step::Command(EngineCommand::Stop { ack }) => {
                    let outcome = self.handle_stop().await;
                    let _ = ack.send(outcome);
                }
                Step::Command(EngineCommand::Shutdown { ack }) => {
                    self.teardown().await;
                    self.publish();
                    let _ = ack.send(());
                    break;
                }
                Step::Closed => {
                    self.teardown().await;
                    self.publish();
                    break;
                }
                Step::Event(request_id, Some(event)) => {
                    self.handle_event(&request_id, event).await;
                }
                Step::Event(request_id, None) => {
                    debug!(request_id = %request_id, "Subscription closed by producer");
                    self.subscription = None;
                }
                Step::Tick => {
                    if let Some(dispatch) = self.engine.tick(Instant::now()) {
                        if dispatch.drained {
                            self.finalize_if_ready().await;
                        }
                    }
                }
                Step::Watchdog => {
                    if let WatchdogOutcome::TimedOut(failure) =
                        self.engine.watchdog_fired(Instant::now())
                    {
                        self.unsubscribe();
                        self.report_failure(failure);
                    }
                }
                Step::Readout => {}
            }
            self.publish();
        }
        debug!(chat_id = %self.engine.chat_id(), "Engine runner stopped");
    }

    async fn handle_start(
        &mut self,
        request_id: String,
        label: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if let Some(timeout) = timeout
            && timeout.is_zero()
        {
            return Err(StreamError::InvalidConfig(
                "inactivity timeout must be greater than zero".into(),
            ));
        }

        // A finalization still animating is flushed and persisted first.
        if self.engine.session().is_completing() {
            self.engine.flush_pending();
            self.finalize_if_ready().await;
        }
        self.unsubscribe();
        self.frozen = None;

        match self.transport.subscribe(&request_id).await {
            Ok(subscription) => {
                self.engine.start(&request_id, label, timeout, Instant::now());
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Failed to subscribe to stream");
                if self.engine.status() != SessionStatus::Idle {
                    self.engine.reset_session();
                }
                self.frozen = Some(LiveSnapshot::idle_with_error(e.to_string()));
                self.notify(EngineNotice::Failed {
                    request_id: Some(request_id),
                    error: e.clone(),
                });
                Err(e)
            }
        }
    }

    async fn handle_stop(&mut self) -> StopOutcome {
        self.drain_delivered().await;
        let request_id = self.engine.session().request_id().map(str::to_string);
        let outcome = self.engine.stop();
        match outcome {
            StopOutcome::Inactive => {}
            StopOutcome::Cancelled => {
                self.unsubscribe();
                self.notify(EngineNotice::Cancelled { request_id });
            }
            StopOutcome::Finalizing => {
                self.unsubscribe();
                self.finalize_if_ready().await;
            }
        }
        outcome
    }

    async fn handle_event(&mut self, request_id: &str, event: InboundEvent) {
        match self.engine.handle_event(request_id, &event, Instant::now()) {
            EventOutcome::Ignored | EventOutcome::Applied => {}
            EventOutcome::FinalizeRequested => {
                self.unsubscribe();
                self.finalize_if_ready().await;
            }
            EventOutcome::Failed(failure) => {
                self.unsubscribe();
                self.report_failure(failure);
            }
        }
    }

    /// Apply events the transport delivered before a stop was observed
    async fn drain_delivered(&mut self) {
        while let Some(subscription) = self.subscription.as_mut() {
            let Some(event) = subscription.try_recv() else {
                break;
            };
            let request_id = subscription.request_id().to_string();
            self.handle_event(&request_id, event).await;
        }
    }

    /// Runner exit: persist what was received, skipping the animation
    async fn teardown(&mut self) {
        self.drain_delivered().await;
        self.unsubscribe();
        let request_id = self.engine.session().request_id().map(str::to_string);
        if self.engine.stop() == StopOutcome::Cancelled {
            self.notify(EngineNotice::Cancelled { request_id });
        }
        if self.engine.session().is_completing() {
            self.engine.flush_pending();
            self.finalize_if_ready().await;
        }
    }

    /// Persist the final message if the queue has drained
    async fn finalize_if_ready(&mut self) {
        let Some(message) = self.engine.take_final_message(Instant::now()) else {
            return;
        };
        let request_id = self.engine.session().request_id().map(str::to_string);
        let chat_id = self.engine.chat_id().to_string();

        let result = self.store.commit(&chat_id, message.clone()).await;
        self.engine.reset_session();

        match result {
            Ok(outcome) => {
                info!(
                    chat_id = %chat_id,
                    request_id = ?request_id,
                    ?outcome,
                    chars = message.payload.chars().count(),
                    thinking_secs = message.thinking_duration,
                    "Stream finalized"
                );
                self.frozen = None;
                self.notify(EngineNotice::Finalized {
                    request_id,
                    message,
                    outcome,
                });
            }
            Err(e) => {
                error!(chat_id = %chat_id, request_id = ?request_id, error = %e, "Failed to persist final message");
                self.frozen = Some(LiveSnapshot::idle_with_error(e.to_string()));
                self.notify(EngineNotice::Failed {
                    request_id,
                    error: e,
                });
            }
        }
    }

    fn report_failure(&mut self, failure: Failure) {
        let Failure { error, frozen } = failure;
        let request_id = frozen.request_id.clone();
        self.frozen = Some(frozen);
        self.notify(EngineNotice::Failed { request_id, error });
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(request_id = subscription.request_id(), "Unsubscribing from stream");
            subscription.unsubscribe();
        }
    }

    fn notify(&self, notice: EngineNotice) {
        if self.notices.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }

    fn publish(&self) {
        let snapshot = match &self.frozen {
            Some(frozen) if self.engine.status() == SessionStatus::Idle => frozen.clone(),
            _ => self.engine.snapshot(Instant::now()),
        };
        self.snapshots.send_replace(snapshot);
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> (String, Option<InboundEvent>) {
    match subscription {
        Some(subscription) => {
            let event = subscription.recv().await;
            (subscription.request_id().to_string(), event)
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMessageStore;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    struct Harness {
        handle: EngineHandle,
        notices: NoticeReceiver,
        transport: ChannelTransport,
        store: InMemoryMessageStore,
    }

    fn harness() -> Harness {
        let transport = ChannelTransport::new();
        let store = InMemoryMessageStore::new();
        let (handle, notices) = EngineRunner::spawn(
            EngineConfig::default(),
            "chat-1",
            Arc::new(transport.clone()),
            Arc::new(store.clone()),
        )
        .unwrap();
        Harness {
            handle,
            notices,
            transport,
            store,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalizes_once_despite_later_watchdog() {
        let mut h = harness();
        h.handle
            .start_with_timeout("r1", Some("Thinking...".into()), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(h.transport.push("r1", InboundEvent::data(0.5, "The quick brown fox")));
        assert!(h.transport.push("r1", InboundEvent::data(1.0, " jumps")));

        let notice = h.notices.recv().await.unwrap();
        let EngineNotice::Finalized {
            request_id,
            message,
            outcome,
        } = notice
        else {
            panic!("Expected finalized notice, got {notice:?}");
        };
        assert_eq!(request_id.as_deref(), Some("r1"));
        assert_eq!(message.payload, "The quick brown fox jumps");
        assert_eq!(outcome, CommitOutcome::Appended);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.store.commit_count(), 1);
        assert!(h.notices.try_recv().is_err());
        assert!(!h.handle.snapshot().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_with_content_persists_once() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        h.transport.push("r1", InboundEvent::data(0.3, "partial answer"));
        settle().await;

        let outcome = h.handle.request_stop().confirm().await.unwrap();
        assert_eq!(outcome, StopOutcome::Finalizing);

        match h.notices.recv().await.unwrap() {
            EngineNotice::Finalized { message, .. } => assert_eq!(message.payload, "partial answer"),
            other => panic!("Expected finalized notice, got {other:?}"),
        }
        assert_eq!(h.store.commit_count(), 1);
        assert!(!h.transport.is_active("r1"));
        assert!(!h.handle.snapshot().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_right_after_delivery_keeps_content() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        assert!(h.transport.push("r1", InboundEvent::data(0.5, "hello world")));

        let outcome = h.handle.request_stop().confirm().await.unwrap();
        assert_eq!(outcome, StopOutcome::Finalizing);

        match h.notices.recv().await.unwrap() {
            EngineNotice::Finalized { message, .. } => assert_eq!(message.payload, "hello world"),
            other => panic!("Expected finalized notice, got {other:?}"),
        }
        assert_eq!(h.store.commit_count(), 1);
        assert!(h.notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_right_after_delivery_keeps_content() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        assert!(h.transport.push("r1", InboundEvent::data(0.5, "last words")));

        h.handle.shutdown().await.unwrap();
        match h.notices.recv().await.unwrap() {
            EngineNotice::Finalized { message, .. } => assert_eq!(message.payload, "last words"),
            other => panic!("Expected finalized notice, got {other:?}"),
        }
        assert_eq!(h.store.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_content_cancels() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();

        let outcome = h.handle.request_stop().confirm().await.unwrap();
        assert_eq!(outcome, StopOutcome::Cancelled);
        assert_eq!(
            h.notices.recv().await.unwrap(),
            EngineNotice::Cancelled {
                request_id: Some("r1".into())
            }
        );
        assert_eq!(h.store.commit_count(), 0);
        assert!(!h.handle.snapshot().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stop_request_does_nothing() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();

        let request = h.handle.request_stop();
        drop(request);
        settle().await;
        assert!(h.handle.snapshot().is_streaming);

        h.transport.push("r1", InboundEvent::data(1.0, "finished"));
        assert!(matches!(
            h.notices.recv().await.unwrap(),
            EngineNotice::Finalized { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_freezes_content() {
        let mut h = harness();
        h.handle
            .start_with_timeout("r1", None, Duration::from_secs(60))
            .await
            .unwrap();
        h.transport.push("r1", InboundEvent::data(0.2, "partial"));

        let notice = h.notices.recv().await.unwrap();
        assert_eq!(
            notice,
            EngineNotice::Failed {
                request_id: Some("r1".into()),
                error: StreamError::Timeout { timeout_secs: 60 },
            }
        );
        settle().await;

        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.streaming_content, "partial");
        assert!(!snapshot.is_loading);
        assert!(snapshot.error.is_some());
        assert!(!h.transport.is_active("r1"));
        assert_eq!(h.store.commit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_reported() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        h.transport.push("r1", InboundEvent::failure("upstream died"));

        assert_eq!(
            h.notices.recv().await.unwrap(),
            EngineNotice::Failed {
                request_id: Some("r1".into()),
                error: StreamError::Transport("upstream died".into()),
            }
        );
        assert_eq!(h.store.commit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_clears_loading() {
        let mut h = harness();
        h.store.set_fail_commits(true);
        h.handle.start("r1", None).await.unwrap();
        h.transport.push("r1", InboundEvent::data(1.0, "answer"));

        match h.notices.recv().await.unwrap() {
            EngineNotice::Failed { error, .. } => {
                assert!(matches!(error, StreamError::Persistence(_)))
            }
            other => panic!("Expected failure notice, got {other:?}"),
        }
        settle().await;

        let snapshot = h.handle.snapshot();
        assert!(!snapshot.is_loading);
        assert!(snapshot.streaming_content.is_empty());
        assert!(snapshot.error.is_some());
        assert_eq!(h.store.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_supersedes_old() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        h.transport.push("r1", InboundEvent::data(0.2, "old text"));
        settle().await;

        h.handle.start("r2", None).await.unwrap();
        assert!(!h.transport.push("r1", InboundEvent::data(1.0, "late")));
        h.transport.push("r2", InboundEvent::data(1.0, "new text"));

        match h.notices.recv().await.unwrap() {
            EngineNotice::Finalized {
                request_id,
                message,
                ..
            } => {
                assert_eq!(request_id.as_deref(), Some("r2"));
                assert_eq!(message.payload, "new text");
            }
            other => panic!("Expected finalized notice, got {other:?}"),
        }
        assert_eq!(h.store.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_received_content() {
        let mut h = harness();
        h.handle.start("r1", None).await.unwrap();
        h.transport.push("r1", InboundEvent::data(0.5, "half an answer"));
        settle().await;

        h.handle.shutdown().await.unwrap();
        match h.notices.recv().await.unwrap() {
            EngineNotice::Finalized { message, .. } => assert_eq!(message.payload, "half an answer"),
            other => panic!("Expected finalized notice, got {other:?}"),
        }
        assert_eq!(
            h.handle.start("r2", None).await,
            Err(StreamError::EngineClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_readout_advances() {
        let h = harness();
        h.handle.start("r1", None).await.unwrap();
        h.transport.push(
            "r1",
            InboundEvent::data(0.1, "considering").with_info(json!({"ephemeral": true})),
        );
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        let snapshot = h.handle.snapshot();
        assert!(snapshot.is_thinking);
        assert!(snapshot.thinking_duration >= 2);
        assert_eq!(snapshot.ephemeral_content, "considering");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_chunk_chars: 0,
            ..EngineConfig::default()
        };
        let result = EngineRunner::spawn(
            config,
            "chat-1",
            Arc::new(ChannelTransport::new()),
            Arc::new(InMemoryMessageStore::new()),
        );
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_override_rejected() {
        let h = harness();
        let result = h.handle.start_with_timeout("r1", None, Duration::ZERO).await;
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
        assert!(!h.transport.is_active("r1"));
        assert!(!h.handle.snapshot().is_loading);

        h.handle
            .start_with_timeout("r2", None, Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert!(h.transport.push("r2", InboundEvent::data(0.5, "still alive")));
        settle().await;
        assert!(h.handle.snapshot().is_streaming);
    }
}
