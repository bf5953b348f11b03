//! StreamFlow Core - turns a push-event stream into a persisted chat message.
//!
//! The synchronous [`StreamEngine`] holds one chat's session state and is
//! driven by an [`EngineRunner`] task. In-process collaborators
//! ([`ChannelTransport`], [`InMemoryMessageStore`]) are provided for replay
//! and tests.

pub mod chunker;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod finalizer;
pub mod history;
pub mod info;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod thinking;
pub mod tools;
pub mod transport;
pub mod watchdog;

pub use chunker::chunk_text;
pub use config::{EngineConfig, EnvelopeConfig};
pub use engine::{EventOutcome, Failure, StopOutcome, StreamEngine, WatchdogOutcome};
pub use history::ChatHistory;
pub use runner::{EngineCommand, EngineHandle, EngineNotice, EngineRunner, NoticeReceiver, StopRequest};
pub use session::{SessionStatus, StreamSession};
pub use snapshot::LiveSnapshot;
pub use store::InMemoryMessageStore;
pub use transport::ChannelTransport;
