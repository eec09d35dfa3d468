//! Taskboard: task position and status transition engine.
//!
//! This crate keeps tasks densely ordered within their status columns,
//! relocates them between columns atomically, resolves the status, priority
//! and type vocabularies with self-healing defaults, and refuses to delete
//! tasks others still depend on.
//!
//! # Architecture
//!
//! Taskboard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, memory)
//!
//! # Modules
//!
//! - [`board`]: Task ordering, moves, reference data and dependencies
//! - [`config`]: Layered engine configuration
//! - [`telemetry`]: Tracing subscriber setup
//! - [`worker`]: Shell quoting for the embedded `PostgreSQL` worker

pub mod board;
pub mod config;
pub mod telemetry;
pub mod worker;
