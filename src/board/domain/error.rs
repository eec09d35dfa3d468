//! Error types for board domain validation and parsing.

use super::TaskId;
use thiserror::Error;

/// Errors returned while constructing domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task identifier is not a UUID.
    #[error("invalid task identifier '{0}'")]
    InvalidTaskId(String),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task title exceeds the column width.
    #[error("task title has {actual} characters, exceeds limit of {max}")]
    TitleTooLong {
        /// Maximum title length in characters.
        max: usize,
        /// Actual title length in characters.
        actual: usize,
    },

    /// A reference identifier is zero or negative.
    #[error("invalid reference identifier {0}, expected a positive integer")]
    InvalidReferenceId(i32),

    /// A reference code is empty after trimming.
    #[error("reference code must not be empty")]
    EmptyReferenceCode,

    /// The requested position is negative or too large.
    #[error("invalid order index {0}, expected a non-negative 32-bit integer")]
    InvalidOrderIndex(i64),

    /// A task cannot depend on itself.
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),
}

/// Error returned while parsing reference kinds from configuration or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown reference kind: {0}")]
pub struct ParseReferenceKindError(pub String);
