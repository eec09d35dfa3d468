//! `PostgreSQL` adapters for board persistence.

mod audit_sink;
mod models;
mod pool;
mod schema;
mod store;

pub use audit_sink::PostgresAuditSink;
pub use pool::{BoardPgPool, connect};
pub use store::PostgresBoardStore;
