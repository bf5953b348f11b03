//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamflow_traits::{MessageEnvelope, Result, StreamError};

/// Default inactivity window before a session is declared failed.
pub const DEFAULT_WATCHDOG_TIMEOUT_SECS: u64 = 300;
/// Default maximum characters per dispatched chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 9;
/// Default minimum time between two chunk dispatches.
pub const DEFAULT_MIN_TICK_INTERVAL_MS: u64 = 4;
/// Default display refresh interval; no tick is later than this.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
/// Default period of the live thinking-time readout.
pub const DEFAULT_READOUT_INTERVAL_MS: u64 = 1000;

/// Stream engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inactivity window in seconds
    pub watchdog_timeout_secs: u64,
    /// Maximum characters per chunk
    pub max_chunk_chars: usize,
    /// Minimum milliseconds between chunk dispatches
    pub min_tick_interval_ms: u64,
    /// Display refresh interval in milliseconds
    pub frame_interval_ms: u64,
    /// Live readout interval in milliseconds
    pub readout_interval_ms: u64,
    /// Envelope written on persisted messages
    pub envelope: EnvelopeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_secs: DEFAULT_WATCHDOG_TIMEOUT_SECS,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            min_tick_interval_ms: DEFAULT_MIN_TICK_INTERVAL_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            readout_interval_ms: DEFAULT_READOUT_INTERVAL_MS,
            envelope: EnvelopeConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_secs)
    }

    pub fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn readout_interval(&self) -> Duration {
        Duration::from_millis(self.readout_interval_ms)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.watchdog_timeout_secs == 0 {
            return Err(StreamError::InvalidConfig(
                "watchdog_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_chunk_chars == 0 {
            return Err(StreamError::InvalidConfig(
                "max_chunk_chars must be positive".to_string(),
            ));
        }
        if self.readout_interval_ms == 0 {
            return Err(StreamError::InvalidConfig(
                "readout_interval_ms must be positive".to_string(),
            ));
        }
        if self.min_tick_interval_ms > self.frame_interval_ms {
            return Err(StreamError::InvalidConfig(format!(
                "min_tick_interval_ms ({}) exceeds frame_interval_ms ({})",
                self.min_tick_interval_ms, self.frame_interval_ms
            )));
        }
        Ok(())
    }

    /// Build the envelope for a message in `chat_id`
    pub fn envelope_for(&self, chat_id: &str) -> MessageEnvelope {
        MessageEnvelope {
            sender: self.envelope.sender.clone(),
            direction: self.envelope.direction.clone(),
            position: self.envelope.position.clone(),
            entity_id: chat_id.to_string(),
        }
    }
}

/// Envelope defaults for persisted messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub sender: String,
    pub direction: String,
    pub position: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            sender: "assistant".to_string(),
            direction: "incoming".to_string(),
            position: "single".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.watchdog_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_chunk_chars, 9);
        assert_eq!(config.min_tick_interval(), Duration::from_millis(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"watchdog_timeout_secs": 60}"#).unwrap();
        assert_eq!(config.watchdog_timeout_secs, 60);
        assert_eq!(config.max_chunk_chars, DEFAULT_MAX_CHUNK_CHARS);
        assert_eq!(config.envelope.sender, "assistant");
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = EngineConfig {
            max_chunk_chars: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_envelope_for_chat() {
        let envelope = EngineConfig::default().envelope_for("chat-9");
        assert_eq!(envelope.entity_id, "chat-9");
        assert_eq!(envelope.direction, "incoming");
    }
}
