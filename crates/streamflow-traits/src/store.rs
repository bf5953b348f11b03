//! Chat history persistence abstraction.
//!
//! Implementations are provided by downstream crates (an in-memory store in
//! streamflow-core, a JSON file store in the CLI).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FinalMessage;

/// How a committed message landed in the chat history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// An `is_streaming` placeholder was replaced in place
    ReplacedPlaceholder,
    /// No placeholder existed, the message was appended
    Appended,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a finished message into the chat's history.
    ///
    /// Replaces the chat's streaming placeholder if one exists, otherwise
    /// appends. Failures must be reported as `StreamError::Persistence`.
    async fn commit(&self, chat_id: &str, message: FinalMessage) -> Result<CommitOutcome>;
}
