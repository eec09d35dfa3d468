//! Typed commands accepted by the board service.

use crate::board::domain::{
    ActorId, BoardId, OrderIndex, ReferenceEntry, StatusId, Task, TaskContent, TaskId,
};
use serde::Serialize;

/// Request payload for creating a task at the tail of its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub(super) title: String,
    pub(super) description: String,
    pub(super) status_id: Option<StatusId>,
    pub(super) priority_code: Option<String>,
    pub(super) type_code: Option<String>,
    pub(super) board_id: Option<BoardId>,
    pub(super) owner_id: Option<ActorId>,
    pub(super) content: TaskContent,
}

impl CreateTaskRequest {
    /// Creates a request with the default status, priority and type.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status_id: None,
            priority_code: None,
            type_code: None,
            board_id: None,
            owner_id: None,
            content: TaskContent::default(),
        }
    }

    /// Sets the short description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Places the task in a status column other than the first.
    #[must_use]
    pub const fn with_status(mut self, status_id: StatusId) -> Self {
        self.status_id = Some(status_id);
        self
    }

    /// Sets the priority by code.
    #[must_use]
    pub fn with_priority(mut self, code: impl Into<String>) -> Self {
        self.priority_code = Some(code.into());
        self
    }

    /// Sets the type by code.
    #[must_use]
    pub fn with_type(mut self, code: impl Into<String>) -> Self {
        self.type_code = Some(code.into());
        self
    }

    /// Scopes the task to a board.
    #[must_use]
    pub const fn on_board(mut self, board_id: BoardId) -> Self {
        self.board_id = Some(board_id);
        self
    }

    /// Records the creator.
    #[must_use]
    pub const fn owned_by(mut self, owner_id: ActorId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Sets the content block.
    #[must_use]
    pub fn with_content(mut self, content: TaskContent) -> Self {
        self.content = content;
        self
    }
}

/// Request payload for relocating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTaskRequest {
    pub(super) task_id: TaskId,
    pub(super) target_status: StatusId,
    pub(super) target_order: OrderIndex,
    pub(super) previous_status: Option<StatusId>,
    pub(super) type_code: Option<String>,
    pub(super) comment: Option<String>,
    pub(super) actor: Option<ActorId>,
}

impl MoveTaskRequest {
    /// Creates a move to `target_order` within `target_status`.
    #[must_use]
    pub const fn new(task_id: TaskId, target_status: StatusId, target_order: OrderIndex) -> Self {
        Self {
            task_id,
            target_status,
            target_order,
            previous_status: None,
            type_code: None,
            comment: None,
            actor: None,
        }
    }

    /// Records the status the caller believes the task is in.
    ///
    /// Only used to detect stale client views.
    #[must_use]
    pub const fn from_status(mut self, previous_status: StatusId) -> Self {
        self.previous_status = Some(previous_status);
        self
    }

    /// Sets the type by code; blank codes select the default type.
    #[must_use]
    pub fn with_type(mut self, code: impl Into<String>) -> Self {
        self.type_code = Some(code.into());
        self
    }

    /// Attaches a free-text reason to the status change.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Records who performs the move.
    #[must_use]
    pub const fn by(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Returns the task to move.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the destination status column.
    #[must_use]
    pub const fn target_status(&self) -> StatusId {
        self.target_status
    }

    /// Returns the requested destination position.
    #[must_use]
    pub const fn target_order(&self) -> OrderIndex {
        self.target_order
    }
}

/// Request payload for editing the non-positional fields of a task.
///
/// Unset fields keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub(super) task_id: TaskId,
    pub(super) title: Option<String>,
    pub(super) description: Option<String>,
    pub(super) priority_code: Option<String>,
    pub(super) type_code: Option<String>,
    pub(super) content: Option<TaskContent>,
}

impl UpdateTaskRequest {
    /// Creates an empty edit of `task_id`.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            title: None,
            description: None,
            priority_code: None,
            type_code: None,
            content: None,
        }
    }

    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replaces the short description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reclassifies the priority by code.
    #[must_use]
    pub fn with_priority(mut self, code: impl Into<String>) -> Self {
        self.priority_code = Some(code.into());
        self
    }

    /// Reclassifies the type by code; blank codes select the default type.
    #[must_use]
    pub fn with_type(mut self, code: impl Into<String>) -> Self {
        self.type_code = Some(code.into());
        self
    }

    /// Replaces the content block.
    #[must_use]
    pub fn with_content(mut self, content: TaskContent) -> Self {
        self.content = Some(content);
        self
    }

    /// Returns whether the request changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority_code.is_none()
            && self.type_code.is_none()
            && self.content.is_none()
    }
}

/// A task together with its resolved reference entries.
///
/// Entries are `None` only when the vocabulary row disappeared after the
/// task was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDetails {
    /// Task as stored.
    pub task: Task,
    /// Status column entry.
    pub status: Option<ReferenceEntry>,
    /// Priority entry.
    pub priority: Option<ReferenceEntry>,
    /// Type entry.
    pub task_type: Option<ReferenceEntry>,
}
