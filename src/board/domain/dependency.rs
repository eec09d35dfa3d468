//! Directed dependency edges between tasks.

use super::{TaskDomainError, TaskId};
use serde::{Deserialize, Serialize};

/// `dependent` cannot finish before `dependency`.
///
/// A task with inbound edges cannot be deleted; deleting a dependent removes
/// its outbound edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    dependent: TaskId,
    dependency: TaskId,
}

impl DependencyEdge {
    /// Creates an edge.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SelfDependency`] when both ends are the same
    /// task.
    pub fn new(dependent: TaskId, dependency: TaskId) -> Result<Self, TaskDomainError> {
        if dependent == dependency {
            return Err(TaskDomainError::SelfDependency(dependent));
        }
        Ok(Self {
            dependent,
            dependency,
        })
    }

    /// Returns the task that waits.
    #[must_use]
    pub const fn dependent(self) -> TaskId {
        self.dependent
    }

    /// Returns the task waited on.
    #[must_use]
    pub const fn dependency(self) -> TaskId {
        self.dependency
    }

    /// Returns whether the edge touches `task_id` at either end.
    #[must_use]
    pub fn touches(self, task_id: TaskId) -> bool {
        self.dependent == task_id || self.dependency == task_id
    }
}
