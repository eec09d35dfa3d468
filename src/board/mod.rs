//! Task board bounded context.
//!
//! Tasks live in partitions keyed by board and status column. Within a
//! partition their order indices always form the range `0..n`; creation,
//! moves and deletion shift neighbours inside the same transaction to keep it
//! that way.

pub mod adapters;
pub mod api;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
