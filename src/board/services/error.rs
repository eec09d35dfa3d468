//! Service-level error taxonomy.

use super::reference::ReferenceError;
use crate::board::{
    domain::{
        DependencyEdge, OrderIndex, OrderingError, Partition, PriorityId, ReferenceKind, StatusId,
        TaskDomainError, TaskId, TypeId,
    },
    ports::{AuditSinkError, TaskStoreError},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller sent missing or malformed input.
    Validation,
    /// The task or a referenced row does not exist.
    NotFound,
    /// The operation conflicts with current state.
    Conflict,
    /// The engine failed; the caller may retry.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status code for the category.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input rejected before or inside a transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A domain value could not be constructed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// A required field is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The status column does not exist.
    #[error("unknown status {0}")]
    UnknownStatus(StatusId),

    /// The priority does not exist.
    #[error("unknown priority {0}")]
    UnknownPriority(PriorityId),

    /// The task type does not exist.
    #[error("unknown task type {0}")]
    UnknownType(TypeId),

    /// A vocabulary code matched nothing.
    #[error("unknown {kind} code '{code}'")]
    UnknownCode {
        /// Vocabulary searched.
        kind: ReferenceKind,
        /// Code that did not match.
        code: String,
    },

    /// The requested position is past the tail.
    #[error("order {requested} is out of range, partition accepts 0..={max}")]
    OrderOutOfRange {
        /// Position asked for.
        requested: OrderIndex,
        /// Largest accepted position.
        max: OrderIndex,
    },

    /// The partition cannot take another task.
    #[error("partition {0} is full")]
    PartitionFull(Partition),

    /// The dependency would close a cycle.
    #[error("dependency {} -> {} would create a cycle", .0.dependent(), .0.dependency())]
    DependencyCycle(DependencyEdge),
}

/// Cause of an internal failure.
#[derive(Debug, Clone, Error)]
pub enum InternalError {
    /// The task store failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),

    /// Reference data could not be loaded or initialised.
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// The audit log could not be read.
    #[error(transparent)]
    Audit(#[from] AuditSinkError),
}

/// Errors returned by [`super::TaskBoardService`].
#[derive(Debug, Clone, Error)]
pub enum TaskBoardError {
    /// Input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Other tasks depend on the task being deleted.
    #[error("task {task_id} has {dependent_count} dependent task(s)")]
    DependentsExist {
        /// Task that was to be deleted.
        task_id: TaskId,
        /// Number of inbound dependency edges.
        dependent_count: u64,
    },

    /// The engine failed.
    #[error("{operation} failed: {source}")]
    Internal {
        /// Operation that failed.
        operation: &'static str,
        /// Task involved, when known.
        task_id: Option<TaskId>,
        /// Underlying cause.
        #[source]
        source: InternalError,
    },
}

impl TaskBoardError {
    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DependentsExist { .. } => ErrorKind::Conflict,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Maps a store failure raised while running `operation`.
    #[must_use]
    pub fn from_store(err: TaskStoreError, operation: &'static str, task_id: Option<TaskId>) -> Self {
        match err {
            TaskStoreError::NotFound(id) => Self::NotFound(id),
            TaskStoreError::UnknownStatus(id) => ValidationError::UnknownStatus(id).into(),
            TaskStoreError::UnknownPriority(id) => ValidationError::UnknownPriority(id).into(),
            TaskStoreError::UnknownType(id) => ValidationError::UnknownType(id).into(),
            TaskStoreError::Ordering(OrderingError::OutOfRange { requested, max }) => {
                ValidationError::OrderOutOfRange { requested, max }.into()
            }
            TaskStoreError::Ordering(OrderingError::PartitionFull(partition)) => {
                ValidationError::PartitionFull(partition).into()
            }
            TaskStoreError::DependencyCycle(edge) => ValidationError::DependencyCycle(edge).into(),
            TaskStoreError::DependentsExist {
                task_id: id,
                dependent_count,
            } => Self::DependentsExist {
                task_id: id,
                dependent_count,
            },
            other @ (TaskStoreError::DuplicateTask(_)
            | TaskStoreError::SerializationConflict
            | TaskStoreError::DeadlineExceeded { .. }
            | TaskStoreError::Persistence(_)) => Self::Internal {
                operation,
                task_id,
                source: other.into(),
            },
        }
    }

    /// Maps a reference data failure raised while running `operation`.
    #[must_use]
    pub fn from_reference(
        err: ReferenceError,
        operation: &'static str,
        task_id: Option<TaskId>,
    ) -> Self {
        match err {
            ReferenceError::UnknownCode { kind, code } => {
                ValidationError::UnknownCode { kind, code }.into()
            }
            other @ (ReferenceError::Uninitialized(_)
            | ReferenceError::InvalidId { .. }
            | ReferenceError::Store(_)) => Self::Internal {
                operation,
                task_id,
                source: other.into(),
            },
        }
    }
}

impl From<TaskDomainError> for TaskBoardError {
    fn from(value: TaskDomainError) -> Self {
        Self::Validation(value.into())
    }
}

/// Result type for board service operations.
pub type TaskBoardResult<T> = Result<T, TaskBoardError>;
