//! Lifecycle events recorded after successful task mutations.

use super::{ActorId, BoardId, OrderIndex, Slot, StatusId, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Action recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// A task was created.
    #[serde(rename = "task:created")]
    Created,
    /// A task changed status or position.
    #[serde(rename = "task:moved")]
    Moved,
    /// A task was deleted.
    #[serde(rename = "task:deleted")]
    Deleted,
}

impl AuditAction {
    /// Returns the persisted action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "task:created",
            Self::Moved => "task:moved",
            Self::Deleted => "task:deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and position change produced by a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Moved task.
    pub task_id: TaskId,
    /// Board scope of the task.
    pub board_id: Option<BoardId>,
    /// Status before the move.
    pub from_status: StatusId,
    /// Status after the move.
    pub to_status: StatusId,
    /// Position before the move.
    pub from_order: OrderIndex,
    /// Position after the move.
    pub to_order: OrderIndex,
    /// Optional free-text reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Who performed the move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorId>,
}

impl StatusChange {
    /// Returns whether the status column changed.
    #[must_use]
    pub fn changes_status(&self) -> bool {
        self.from_status != self.to_status
    }
}

/// Status change read back from the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryRecord {
    /// Identifier of the audit entry that produced the record.
    pub id: Uuid,
    /// The recorded change.
    pub change: StatusChange,
    /// When the move was recorded.
    pub changed_at: DateTime<Utc>,
}

/// Event payload of an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was appended to a partition.
    Created {
        /// Created task.
        task_id: TaskId,
        /// Slot the task was placed in.
        slot: Slot,
        /// Creator.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<ActorId>,
    },
    /// A task was relocated.
    Moved(StatusChange),
    /// A task was removed and its partition compacted.
    Deleted {
        /// Deleted task.
        task_id: TaskId,
        /// Slot the task held.
        slot: Slot,
        /// Who deleted the task.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<ActorId>,
    },
}

impl TaskEvent {
    /// Returns the audit action for the event.
    #[must_use]
    pub const fn action(&self) -> AuditAction {
        match self {
            Self::Created { .. } => AuditAction::Created,
            Self::Moved(_) => AuditAction::Moved,
            Self::Deleted { .. } => AuditAction::Deleted,
        }
    }

    /// Returns the task the event is about.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::Created { task_id, .. } | Self::Deleted { task_id, .. } => *task_id,
            Self::Moved(change) => change.task_id,
        }
    }

    /// Returns the acting user, when known.
    #[must_use]
    pub const fn actor(&self) -> Option<ActorId> {
        match self {
            Self::Created { actor, .. } | Self::Deleted { actor, .. } => *actor,
            Self::Moved(change) => change.actor,
        }
    }
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: Uuid,
    event: TaskEvent,
    occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current clock time.
    #[must_use]
    pub fn new(event: TaskEvent, clock: &impl Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            occurred_at: clock.utc(),
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event payload.
    #[must_use]
    pub const fn event(&self) -> &TaskEvent {
        &self.event
    }

    /// Returns the audit action.
    #[must_use]
    pub const fn action(&self) -> AuditAction {
        self.event.action()
    }

    /// Returns when the event happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Returns the status change for move entries.
    #[must_use]
    pub const fn status_change(&self) -> Option<&StatusChange> {
        match &self.event {
            TaskEvent::Moved(change) => Some(change),
            TaskEvent::Created { .. } | TaskEvent::Deleted { .. } => None,
        }
    }

    /// Returns the history record for move entries.
    #[must_use]
    pub fn history_record(&self) -> Option<StatusHistoryRecord> {
        self.status_change().map(|change| StatusHistoryRecord {
            id: self.id,
            change: change.clone(),
            changed_at: self.occurred_at,
        })
    }

    /// Serialises the event into the generic `details` column.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when the payload cannot be encoded.
    pub fn details(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.event)
    }
}
