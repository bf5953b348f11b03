//! In-flight tool invocation tracking.

use streamflow_traits::{ToolCallEntry, ToolCallRecord, ToolCallStatus};
use tracing::debug;

/// Insertion-ordered map of call id to lifecycle record
#[derive(Debug, Default, Clone)]
pub struct ToolCallTracker {
    entries: Vec<ToolCallEntry>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, call_id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.call_id == call_id)
    }

    /// Record a tool start. Returns true if the call id was new.
    ///
    /// A repeated start refreshes the record in place and resets it to
    /// `thinking`.
    pub fn start(
        &mut self,
        call_id: &str,
        icon: Option<String>,
        user_message: Option<String>,
    ) -> bool {
        let record = ToolCallRecord {
            icon,
            user_message,
            status: ToolCallStatus::Thinking,
            error: None,
        };
        match self.position(call_id) {
            Some(index) => {
                self.entries[index].record = record;
                false
            }
            None => {
                self.entries.push(ToolCallEntry {
                    call_id: call_id.to_string(),
                    record,
                });
                true
            }
        }
    }

    /// Record a tool finish. Unknown call ids are ignored; returns whether a
    /// record was updated.
    pub fn finish(&mut self, call_id: &str, success: bool, error: Option<String>) -> bool {
        let Some(index) = self.position(call_id) else {
            debug!(call_id, "Ignoring finish for unknown tool call");
            return false;
        };
        let record = &mut self.entries[index].record;
        record.status = if success {
            ToolCallStatus::Completed
        } else {
            ToolCallStatus::Failed
        };
        if error.is_some() {
            record.error = error;
        }
        true
    }

    pub fn get(&self, call_id: &str) -> Option<&ToolCallRecord> {
        self.position(call_id).map(|index| &self.entries[index].record)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All records in insertion order
    pub fn entries(&self) -> &[ToolCallEntry] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<ToolCallEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_then_complete() {
        let mut tracker = ToolCallTracker::new();
        assert!(tracker.start("c1", Some("search".into()), Some("Searching".into())));
        assert!(tracker.finish("c1", true, None));

        let record = tracker.get("c1").unwrap();
        assert_eq!(record.status, ToolCallStatus::Completed);
        assert_eq!(record.icon.as_deref(), Some("search"));
        assert_eq!(record.user_message.as_deref(), Some("Searching"));
    }

    #[test]
    fn test_failure_keeps_fields_and_error() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("c1", Some("web".into()), None);
        tracker.finish("c1", false, Some("timeout".into()));

        let record = tracker.get("c1").unwrap();
        assert_eq!(record.status, ToolCallStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("timeout"));
        assert_eq!(record.icon.as_deref(), Some("web"));
    }

    #[test]
    fn test_unknown_finish_creates_nothing() {
        let mut tracker = ToolCallTracker::new();
        assert!(!tracker.finish("ghost", true, None));
        assert!(tracker.is_empty());
        assert!(tracker.get("ghost").is_none());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut tracker = ToolCallTracker::new();
        tracker.start("b", None, None);
        tracker.start("a", None, None);
        tracker.start("c", None, None);
        tracker.finish("a", true, None);
        assert!(!tracker.start("b", Some("again".into()), None));

        let ids: Vec<_> = tracker.entries().iter().map(|e| e.call_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(tracker.get("b").unwrap().icon.as_deref(), Some("again"));
        assert_eq!(tracker.len(), 3);
    }
}
