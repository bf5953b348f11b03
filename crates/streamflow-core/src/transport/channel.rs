//! In-process push transport.
//!
//! Producers push events by request id; each subscription gets its own
//! channel. Used by the replay CLI and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use streamflow_traits::{
    InboundEvent, Result, StreamError, StreamTransport, Subscription, SubscriptionSink,
};
use tracing::debug;

/// Registry of live subscription sinks keyed by request id
pub struct ChannelTransport {
    sinks: Arc<DashMap<String, SubscriptionSink>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(DashMap::new()),
        }
    }

    /// Deliver an event to the subscriber of `request_id`.
    ///
    /// Returns false when nobody is subscribed or the subscriber went away;
    /// a gone subscriber is dropped from the registry.
    pub fn push(&self, request_id: &str, event: InboundEvent) -> bool {
        let delivered = match self.sinks.get_mut(request_id) {
            Some(mut sink) => sink.send(event),
            None => return false,
        };
        if !delivered {
            debug!(request_id, "Subscriber gone, dropping sink");
            self.sinks.remove(request_id);
        }
        delivered
    }

    /// Whether `request_id` still has a live subscriber
    pub fn is_active(&self, request_id: &str) -> bool {
        let cancelled = match self.sinks.get_mut(request_id) {
            Some(mut sink) => sink.is_cancelled(),
            None => return false,
        };
        if cancelled {
            self.sinks.remove(request_id);
        }
        !cancelled
    }

    /// Close the stream for `request_id` from the producer side
    pub fn remove(&self, request_id: &str) -> bool {
        self.sinks.remove(request_id).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChannelTransport {
    fn clone(&self) -> Self {
        Self {
            sinks: Arc::clone(&self.sinks),
        }
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    async fn subscribe(&self, request_id: &str) -> Result<Subscription> {
        if request_id.trim().is_empty() {
            return Err(StreamError::Subscribe("request id is empty".to_string()));
        }
        let (subscription, sink) = Subscription::channel(request_id);
        if self.sinks.insert(request_id.to_string(), sink).is_some() {
            debug!(request_id, "Replaced existing subscription");
        }
        Ok(subscription)
    }
}
