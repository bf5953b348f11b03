//! Paced chunk delivery.
//!
//! Deltas are split into chunks and queued in arrival order regardless of
//! their content class. Each tick dispatches at most one chunk, and ticks are
//! spaced by at least the minimum interval. The tick that empties the queue
//! reports it, which is what releases a pending finalization.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::chunker::chunk_text;

/// One queued fragment and the buffer it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub ephemeral: bool,
}

/// Result of a scheduler tick that dispatched a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub chunk: Chunk,
    /// True when this dispatch emptied the queue
    pub drained: bool,
}

#[derive(Debug)]
pub struct ChunkScheduler {
    queue: VecDeque<Chunk>,
    max_chunk_chars: usize,
    min_interval: Duration,
    frame_interval: Duration,
    last_dispatch: Option<Instant>,
}

impl ChunkScheduler {
    pub fn new(max_chunk_chars: usize, min_interval: Duration, frame_interval: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            max_chunk_chars,
            min_interval,
            frame_interval,
            last_dispatch: None,
        }
    }

    /// Split `text` and queue its chunks. Returns the number of chunks queued.
    pub fn enqueue(&mut self, text: &str, ephemeral: bool) -> usize {
        let chunks = chunk_text(text, self.max_chunk_chars);
        let count = chunks.len();
        self.queue.extend(chunks.into_iter().map(|text| Chunk { text, ephemeral }));
        count
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether any queued chunk carries text
    pub fn has_pending_text(&self) -> bool {
        self.queue.iter().any(|chunk| !chunk.text.is_empty())
    }

    /// When the next tick is due, or `None` while idle.
    ///
    /// Never earlier than the minimum interval after the last dispatch and
    /// never later than one frame from `now`.
    pub fn next_tick_at(&self, now: Instant) -> Option<Instant> {
        if self.queue.is_empty() {
            return None;
        }
        let due = match self.last_dispatch {
            Some(last) => (last + self.min_interval).max(now),
            None => now,
        };
        Some(due.min(now + self.frame_interval))
    }

    /// Dispatch the head chunk if a tick is allowed at `now`
    pub fn tick(&mut self, now: Instant) -> Option<Dispatch> {
        if let Some(last) = self.last_dispatch
            && now < last + self.min_interval
        {
            return None;
        }
        let chunk = self.queue.pop_front()?;
        self.last_dispatch = Some(now);
        Some(Dispatch {
            chunk,
            drained: self.queue.is_empty(),
        })
    }

    /// Remove every queued chunk at once, in order
    pub fn drain_all(&mut self) -> Vec<Chunk> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_dispatch = None;
    }
}
