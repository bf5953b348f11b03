//! Message store implementations.

mod memory;

pub use memory::InMemoryMessageStore;
