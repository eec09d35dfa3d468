//! Port contracts for the board engine.
//!
//! Ports define infrastructure-agnostic interfaces used by board services.

pub mod audit;
pub mod reference;
pub mod store;

pub use audit::{AuditSink, AuditSinkError};
pub use reference::{ReferenceStore, ReferenceStoreError, ReferenceStoreResult};
pub use store::{
    MoveCommand, MoveOutcome, TaskStore, TaskStoreError, TaskStoreResult, TransactionBudget,
};
