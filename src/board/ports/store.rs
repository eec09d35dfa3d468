//! Transactional task storage contract.

use crate::board::domain::{
    DependencyEdge, MovePlan, OrderingError, OutOfRangePolicy, OrderIndex, Partition, PriorityId,
    StatusId, Task, TaskEdit, TaskId, TypeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Wall-clock allowance for a single mutating transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionBudget {
    started: Instant,
    limit: Duration,
    lock_timeout: Duration,
}

impl TransactionBudget {
    /// Starts a budget now.
    #[must_use]
    pub fn start(limit: Duration, lock_timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            lock_timeout,
        }
    }

    /// Returns the overall limit.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Returns how long a row lock may be waited on.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout.min(self.limit)
    }

    /// Returns the time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    /// Fails once the deadline has passed.
    ///
    /// Stores call this immediately before committing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DeadlineExceeded`] when no time is left.
    pub fn ensure_remaining(&self) -> TaskStoreResult<()> {
        if self.remaining().is_zero() {
            return Err(TaskStoreError::DeadlineExceeded { limit: self.limit });
        }
        Ok(())
    }
}

/// Parameters of a relocation executed inside one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    /// Task to relocate.
    pub task_id: TaskId,
    /// Destination status column.
    pub target_status: StatusId,
    /// Requested destination position.
    pub target_order: OrderIndex,
    /// Type classifier written alongside the move.
    pub type_id: TypeId,
    /// Handling of positions past the tail.
    pub policy: OutOfRangePolicy,
    /// Timestamp written to `updated_at`.
    pub moved_at: DateTime<Utc>,
    /// Transaction deadline.
    pub budget: TransactionBudget,
}

/// Committed result of a relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Task as written.
    pub task: Task,
    /// Plan that was executed.
    pub plan: MovePlan,
}

/// Task persistence contract.
///
/// Every mutating operation runs in a single serializable transaction and
/// leaves each partition holding exactly the positions `0..n`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Appends a task at the tail of its partition and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::UnknownStatus`], [`TaskStoreError::UnknownPriority`]
    /// or [`TaskStoreError::UnknownType`] for dangling classifiers and
    /// [`TaskStoreError::DuplicateTask`] when the identifier is taken.
    async fn append(&self, task: &Task, budget: TransactionBudget) -> TaskStoreResult<Task>;

    /// Locks the task, plans the relocation against the locked row and
    /// applies it together with every neighbour shift.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] for a missing task,
    /// [`TaskStoreError::UnknownStatus`] or [`TaskStoreError::UnknownType`]
    /// for dangling classifiers and [`TaskStoreError::Ordering`] when the
    /// position is rejected. Nothing is written on error.
    async fn move_task(&self, command: MoveCommand) -> TaskStoreResult<MoveOutcome>;

    /// Locks the task, applies `edit` to the row as stored and returns the
    /// result. Position and status are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist and
    /// [`TaskStoreError::UnknownPriority`] or [`TaskStoreError::UnknownType`]
    /// for dangling classifiers.
    async fn update(&self, task_id: TaskId, edit: &TaskEdit) -> TaskStoreResult<Task>;

    /// Deletes a task without inbound dependencies and closes the gap it
    /// leaves. Returns the task as it was before deletion.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DependentsExist`] when other tasks still
    /// depend on it.
    async fn delete(&self, task_id: TaskId, budget: TransactionBudget) -> TaskStoreResult<Task>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, task_id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Returns the tasks of a partition ordered by position.
    async fn list_partition(&self, partition: Partition) -> TaskStoreResult<Vec<Task>>;

    /// Counts tasks that depend on `task_id`.
    async fn count_dependents(&self, task_id: TaskId) -> TaskStoreResult<u64>;

    /// Records a dependency edge. Existing edges are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when either end is missing and
    /// [`TaskStoreError::DependencyCycle`] when the edge would close a cycle.
    async fn add_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<()>;

    /// Removes a dependency edge, returning whether it existed.
    async fn remove_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<bool>;

    /// Returns the tasks `task_id` depends on.
    async fn dependencies_of(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskId>>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The status column does not exist.
    #[error("unknown status: {0}")]
    UnknownStatus(StatusId),

    /// The priority does not exist.
    #[error("unknown priority: {0}")]
    UnknownPriority(PriorityId),

    /// The task type does not exist.
    #[error("unknown task type: {0}")]
    UnknownType(TypeId),

    /// The requested position could not be planned.
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    /// Other tasks still depend on the task.
    #[error("task {task_id} has {dependent_count} dependent task(s)")]
    DependentsExist {
        /// Task that was to be deleted.
        task_id: TaskId,
        /// Number of inbound dependency edges.
        dependent_count: u64,
    },

    /// The edge would make a task depend on itself transitively.
    #[error("dependency {} -> {} would create a cycle", .0.dependent(), .0.dependency())]
    DependencyCycle(DependencyEdge),

    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A concurrent transaction touched the same rows.
    #[error("serialization conflict with a concurrent transaction")]
    SerializationConflict,

    /// The transaction ran past its budget and was rolled back.
    #[error("transaction exceeded its {limit:?} budget")]
    DeadlineExceeded {
        /// Configured limit.
        limit: Duration,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns whether running the transaction again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SerializationConflict)
    }
}
