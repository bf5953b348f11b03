//! Chat history persisted as a JSON file.
//!
//! The file maps chat ids to their message lists. Every commit rewrites the
//! whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use streamflow_core::ChatHistory;
use streamflow_traits::{CommitOutcome, FinalMessage, MessageStore, StreamError};
use tokio::sync::Mutex;
use tracing::debug;

type Chats = BTreeMap<String, ChatHistory>;

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every chat; a missing file is an empty history
    pub async fn load(&self) -> Result<Chats> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Chats::new());
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read history {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Chats::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid history file {}", self.path.display()))
    }

    async fn save(&self, chats: &Chats) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(chats)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write history {}", self.path.display()))
    }

    /// Add the in-flight placeholder for a chat
    pub async fn push_placeholder(&self, chat_id: &str, placeholder: FinalMessage) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut chats = self.load().await?;
        chats
            .entry(chat_id.to_string())
            .or_default()
            .push_placeholder(placeholder);
        self.save(&chats).await
    }

    async fn commit_inner(&self, chat_id: &str, message: FinalMessage) -> Result<CommitOutcome> {
        let _guard = self.lock.lock().await;
        let mut chats = self.load().await?;
        let outcome = chats.entry(chat_id.to_string()).or_default().commit(message);
        self.save(&chats).await?;
        Ok(outcome)
    }
}

#[async_trait]
impl MessageStore for JsonFileStore {
    async fn commit(
        &self,
        chat_id: &str,
        message: FinalMessage,
    ) -> streamflow_traits::Result<CommitOutcome> {
        let outcome = self
            .commit_inner(chat_id, message)
            .await
            .map_err(|e| StreamError::Persistence(format!("{e:#}")))?;
        debug!(chat_id, path = %self.path.display(), ?outcome, "History updated");
        Ok(outcome)
    }
}
