//! Push-event transport abstraction.
//!
//! A `Subscription` is the consumer end of one request's event stream. The
//! producer end (`SubscriptionSink`) stays with the transport implementation
//! and observes cancellation through a broadcast cancel handle.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::Result;
use crate::models::InboundEvent;

/// Handle for cancelling an active subscription
#[derive(Debug, Clone)]
pub struct StreamCancelHandle {
    sender: broadcast::Sender<()>,
}

impl StreamCancelHandle {
    /// Create a new cancel handle
    pub fn new() -> (Self, StreamCancelReceiver) {
        let (sender, receiver) = broadcast::channel(1);
        (Self { sender }, StreamCancelReceiver::from_receiver(receiver))
    }

    /// Cancel the subscription
    pub fn cancel(&self) {
        let _ = self.sender.send(());
    }

    /// Get another receiver for this handle
    pub fn subscribe(&self) -> StreamCancelReceiver {
        StreamCancelReceiver::from_receiver(self.sender.subscribe())
    }
}

impl Default for StreamCancelHandle {
    fn default() -> Self {
        Self::new().0
    }
}

/// Receiver for subscription cancellation
#[derive(Debug)]
pub struct StreamCancelReceiver {
    receiver: broadcast::Receiver<()>,
    cancelled: bool,
}

impl StreamCancelReceiver {
    fn from_receiver(receiver: broadcast::Receiver<()>) -> Self {
        Self {
            receiver,
            cancelled: false,
        }
    }

    /// Check if cancellation was requested (non-blocking).
    ///
    /// A dropped handle counts as cancellation. Once observed it stays set.
    pub fn is_cancelled(&mut self) -> bool {
        if !self.cancelled {
            self.cancelled = !matches!(
                self.receiver.try_recv(),
                Err(broadcast::error::TryRecvError::Empty)
            );
        }
        self.cancelled
    }

    /// Wait for cancellation
    pub async fn cancelled(&mut self) {
        if !self.cancelled {
            let _ = self.receiver.recv().await;
            self.cancelled = true;
        }
    }
}

/// Consumer end of one request's event stream
#[derive(Debug)]
pub struct Subscription {
    request_id: String,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    cancel: StreamCancelHandle,
}

impl Subscription {
    /// Create a connected subscription/sink pair for `request_id`
    pub fn channel(request_id: impl Into<String>) -> (Self, SubscriptionSink) {
        let request_id = request_id.into();
        let (tx, events) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = StreamCancelHandle::new();
        let sink = SubscriptionSink {
            request_id: request_id.clone(),
            tx,
            cancel_rx,
        };
        (
            Self {
                request_id,
                events,
                cancel,
            },
            sink,
        )
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Receive the next event; `None` once the producer has gone away
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Next event already delivered, without waiting
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.events.try_recv().ok()
    }

    /// Stop delivery and tell the producer to stop
    pub fn unsubscribe(mut self) {
        self.cancel.cancel();
        self.events.close();
    }
}

/// Producer end of one request's event stream
#[derive(Debug)]
pub struct SubscriptionSink {
    request_id: String,
    tx: mpsc::UnboundedSender<InboundEvent>,
    cancel_rx: StreamCancelReceiver,
}

impl SubscriptionSink {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Deliver an event. Returns false once the consumer unsubscribed.
    pub fn send(&mut self, event: InboundEvent) -> bool {
        if self.cancel_rx.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Whether the consumer unsubscribed
    pub fn is_cancelled(&mut self) -> bool {
        self.cancel_rx.is_cancelled() || self.tx.is_closed()
    }

    /// Wait until the consumer unsubscribes
    pub async fn cancelled(&mut self) {
        self.cancel_rx.cancelled().await
    }
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open the event stream for `request_id`.
    ///
    /// Subscription retry is not the engine's concern; a refusal is reported
    /// as `StreamError::Subscribe`.
    async fn subscribe(&self, request_id: &str) -> Result<Subscription>;
}
