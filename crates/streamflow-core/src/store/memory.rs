//! In-memory chat history store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use streamflow_traits::{CommitOutcome, FinalMessage, MessageStore, Result, StreamError};
use tracing::debug;

use crate::history::ChatHistory;

/// Thread-safe store keeping every chat's history in memory
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    chats: Arc<Mutex<HashMap<String, ChatHistory>>>,
    commits: Arc<AtomicUsize>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent commits fail with a persistence error
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of commit attempts, failed ones included
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn push_placeholder(&self, chat_id: &str, placeholder: FinalMessage) {
        self.chats
            .lock()
            .entry(chat_id.to_string())
            .or_default()
            .push_placeholder(placeholder);
    }

    pub fn history(&self, chat_id: &str) -> ChatHistory {
        self.chats.lock().get(chat_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn commit(&self, chat_id: &str, message: FinalMessage) -> Result<CommitOutcome> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StreamError::Persistence(format!(
                "store rejected message for chat {chat_id}"
            )));
        }
        let outcome = self
            .chats
            .lock()
            .entry(chat_id.to_string())
            .or_default()
            .commit(message);
        debug!(chat_id, ?outcome, "Message committed");
        Ok(outcome)
    }
}
