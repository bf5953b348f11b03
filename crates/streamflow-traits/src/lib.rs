//! StreamFlow Traits - Shared types and collaborator abstractions.
//!
//! This crate provides the interfaces shared across the StreamFlow workspace:
//! - Inbound push events and the `toolMessage` sideband payload
//! - The persisted `FinalMessage` record and its envelope
//! - `StreamError` and the crate `Result` alias
//! - `StreamTransport` / `Subscription` (event delivery, unsubscribe)
//! - `MessageStore` (chat history persistence)

pub mod error;
pub mod models;
pub mod store;
pub mod transport;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use error::{Result, StreamError};

pub use models::{
    FinalMessage, InboundEvent, MessageEnvelope, ToolCallEntry, ToolCallRecord, ToolCallStatus,
    ToolMessage,
};

pub use store::{CommitOutcome, MessageStore};

pub use transport::{
    StreamCancelHandle, StreamCancelReceiver, StreamTransport, Subscription, SubscriptionSink,
};
