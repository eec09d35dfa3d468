//! Task aggregate root and its placement within a board.

use super::{
    ActorId, BoardId, OrderIndex, PriorityId, StatusId, TaskContent, TaskDomainError, TaskId,
    TypeId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated task title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskTitle(String);

impl TaskTitle {
    /// Maximum title length, matching the `VARCHAR(255)` column.
    pub const MAX_LENGTH: usize = 255;

    /// Creates a trimmed, non-empty title.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] or
    /// [`TaskDomainError::TitleTooLong`].
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let length = trimmed.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(TaskDomainError::TitleTooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the title as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grouping key within which order indices are dense.
///
/// Tasks without a board form their own partition per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    /// Board scope, `None` for unscoped tasks.
    pub board_id: Option<BoardId>,
    /// Status column.
    pub status_id: StatusId,
}

impl Partition {
    /// Creates a partition key.
    #[must_use]
    pub const fn new(board_id: Option<BoardId>, status_id: StatusId) -> Self {
        Self {
            board_id,
            status_id,
        }
    }

    /// Returns the same board with a different status column.
    #[must_use]
    pub const fn with_status(self, status_id: StatusId) -> Self {
        Self {
            board_id: self.board_id,
            status_id,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.board_id {
            Some(board_id) => write!(f, "board:{board_id}/status:{}", self.status_id),
            None => write!(f, "unscoped/status:{}", self.status_id),
        }
    }
}

/// A position inside a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Partition holding the slot.
    pub partition: Partition,
    /// Zero-based index within the partition.
    pub order_index: OrderIndex,
}

impl Slot {
    /// Creates a slot.
    #[must_use]
    pub const fn new(partition: Partition, order_index: OrderIndex) -> Self {
        Self {
            partition,
            order_index,
        }
    }
}

/// Parameter object for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Task title.
    pub title: TaskTitle,
    /// Short description.
    pub description: String,
    /// Initial status column.
    pub status_id: StatusId,
    /// Priority classifier.
    pub priority_id: PriorityId,
    /// Type classifier.
    pub type_id: TypeId,
    /// Board scope.
    pub board_id: Option<BoardId>,
    /// Creator.
    pub owner_id: Option<ActorId>,
    /// Content block.
    pub content: TaskContent,
}

/// Non-positional field edits of a task.
///
/// Stores apply an edit to the row as it stands inside their transaction,
/// so unset fields never overwrite concurrent changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEdit {
    /// New title.
    pub title: Option<TaskTitle>,
    /// New short description.
    pub description: Option<String>,
    /// New priority classifier.
    pub priority_id: Option<PriorityId>,
    /// New type classifier.
    pub type_id: Option<TypeId>,
    /// New content block.
    pub content: Option<TaskContent>,
    /// Timestamp written to `updated_at`.
    pub edited_at: DateTime<Utc>,
}

impl TaskEdit {
    /// Creates an edit that changes nothing, stamped with the clock time.
    #[must_use]
    pub fn new(clock: &impl Clock) -> Self {
        Self {
            title: None,
            description: None,
            priority_id: None,
            type_id: None,
            content: None,
            edited_at: clock.utc(),
        }
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: TaskTitle,
    description: String,
    status_id: StatusId,
    priority_id: PriorityId,
    type_id: TypeId,
    board_id: Option<BoardId>,
    owner_id: Option<ActorId>,
    order_index: OrderIndex,
    content: TaskContent,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: TaskTitle,
    /// Persisted description.
    pub description: String,
    /// Persisted status column.
    pub status_id: StatusId,
    /// Persisted priority classifier.
    pub priority_id: PriorityId,
    /// Persisted type classifier.
    pub type_id: TypeId,
    /// Persisted board scope.
    pub board_id: Option<BoardId>,
    /// Persisted creator.
    pub owner_id: Option<ActorId>,
    /// Persisted position.
    pub order_index: OrderIndex,
    /// Persisted content block.
    pub content: TaskContent,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task at the head of its partition.
    ///
    /// Stores assign the real tail position through [`Task::placed_at`]
    /// when the task is appended.
    #[must_use]
    pub fn new(data: NewTask, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            title: data.title,
            description: data.description,
            status_id: data.status_id,
            priority_id: data.priority_id,
            type_id: data.type_id,
            board_id: data.board_id,
            owner_id: data.owner_id,
            order_index: OrderIndex::ZERO,
            content: data.content,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            status_id: data.status_id,
            priority_id: data.priority_id,
            type_id: data.type_id,
            board_id: data.board_id,
            owner_id: data.owner_id,
            order_index: data.order_index,
            content: data.content,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the short description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the status column.
    #[must_use]
    pub const fn status_id(&self) -> StatusId {
        self.status_id
    }

    /// Returns the priority classifier.
    #[must_use]
    pub const fn priority_id(&self) -> PriorityId {
        self.priority_id
    }

    /// Returns the type classifier.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the board scope.
    #[must_use]
    pub const fn board_id(&self) -> Option<BoardId> {
        self.board_id
    }

    /// Returns the creator.
    #[must_use]
    pub const fn owner_id(&self) -> Option<ActorId> {
        self.owner_id
    }

    /// Returns the position within the partition.
    #[must_use]
    pub const fn order_index(&self) -> OrderIndex {
        self.order_index
    }

    /// Returns the content block.
    #[must_use]
    pub const fn content(&self) -> &TaskContent {
        &self.content
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the partition the task currently belongs to.
    #[must_use]
    pub const fn partition(&self) -> Partition {
        Partition::new(self.board_id, self.status_id)
    }

    /// Returns the current slot of the task.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        Slot::new(self.partition(), self.order_index)
    }

    /// Returns the task placed at `order_index` without touching timestamps.
    #[must_use]
    pub const fn placed_at(mut self, order_index: OrderIndex) -> Self {
        self.order_index = order_index;
        self
    }

    /// Moves the task to a new slot and type classifier.
    pub fn relocate(&mut self, destination: Slot, type_id: TypeId, moved_at: DateTime<Utc>) {
        self.board_id = destination.partition.board_id;
        self.status_id = destination.partition.status_id;
        self.order_index = destination.order_index;
        self.type_id = type_id;
        self.updated_at = moved_at;
    }

    /// Shifts the task by one slot inside its partition; used by stores when
    /// applying range shifts.
    pub const fn shift_to(&mut self, order_index: OrderIndex) {
        self.order_index = order_index;
    }

    /// Applies the fields set in `edit` and stamps `updated_at`.
    ///
    /// Fields the edit leaves unset keep their current values.
    pub fn apply_edit(&mut self, edit: TaskEdit) {
        if let Some(title) = edit.title {
            self.title = title;
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(priority_id) = edit.priority_id {
            self.priority_id = priority_id;
        }
        if let Some(type_id) = edit.type_id {
            self.type_id = type_id;
        }
        if let Some(mut content) = edit.content {
            content.normalize_criteria_order();
            self.content = content;
        }
        self.updated_at = edit.edited_at;
    }
}
