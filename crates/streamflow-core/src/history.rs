//! Chat history with in-place placeholder replacement.

use serde::{Deserialize, Serialize};
use streamflow_traits::{CommitOutcome, FinalMessage};

/// Ordered messages of one chat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<FinalMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the in-flight placeholder for a response
    pub fn push_placeholder(&mut self, placeholder: FinalMessage) {
        self.messages.push(placeholder);
    }

    /// Replace the latest streaming placeholder with `message`, or append it
    pub fn commit(&mut self, message: FinalMessage) -> CommitOutcome {
        match self.messages.iter().rposition(|m| m.is_streaming) {
            Some(index) => {
                self.messages[index] = message;
                CommitOutcome::ReplacedPlaceholder
            }
            None => {
                self.messages.push(message);
                CommitOutcome::Appended
            }
        }
    }

    pub fn last(&self) -> Option<&FinalMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
