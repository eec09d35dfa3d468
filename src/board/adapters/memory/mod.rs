//! In-memory adapters for tests and single-process embedding.

mod audit_sink;
mod board_store;

pub use audit_sink::InMemoryAuditSink;
pub use board_store::InMemoryBoardStore;
