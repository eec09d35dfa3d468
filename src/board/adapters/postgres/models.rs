//! Diesel row models for board persistence.

use super::schema::{audit_logs, status_history, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Task title.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub title: String,
    /// Short description.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub description: String,
    /// Status column.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub status_id: i32,
    /// Priority classifier.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub priority_id: i32,
    /// Type classifier.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub type_id: i32,
    /// Optional board scope.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub board_id: Option<uuid::Uuid>,
    /// Optional creator.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub owner_id: Option<uuid::Uuid>,
    /// Position within the partition.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub order_index: i32,
    /// Content document.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub content: Value,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Task title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Status column.
    pub status_id: i32,
    /// Priority classifier.
    pub priority_id: i32,
    /// Type classifier.
    pub type_id: i32,
    /// Optional board scope.
    pub board_id: Option<uuid::Uuid>,
    /// Optional creator.
    pub owner_id: Option<uuid::Uuid>,
    /// Position within the partition.
    pub order_index: i32,
    /// Content document.
    pub content: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Changeset for the non-positional task fields.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskDetailsChangeset {
    /// Task title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Priority classifier.
    pub priority_id: i32,
    /// Type classifier.
    pub type_id: i32,
    /// Content document.
    pub content: Value,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for vocabulary tables, read with `sql_query`.
#[derive(Debug, Clone, QueryableByName)]
pub struct ReferenceRow {
    /// Row identifier.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub id: i32,
    /// Unique code.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub code: String,
    /// Display name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Optional description.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub description: Option<String>,
    /// Position in pickers.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub display_order: i32,
}

/// Single boolean produced by `EXISTS` probes.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct PresenceRow {
    /// Whether the probed row exists.
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub present: bool,
}

/// Insert model for audit entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLogRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Action name.
    pub action: String,
    /// Task the event is about.
    pub task_id: uuid::Uuid,
    /// Acting user.
    pub actor_id: Option<uuid::Uuid>,
    /// Event payload.
    pub details: Value,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

/// Insert model for status history records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = status_history)]
pub struct NewStatusHistoryRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Moved task.
    pub task_id: uuid::Uuid,
    /// Board scope of the task.
    pub board_id: Option<uuid::Uuid>,
    /// Status before the move.
    pub from_status_id: i32,
    /// Status after the move.
    pub to_status_id: i32,
    /// Position before the move.
    pub from_order: i32,
    /// Position after the move.
    pub to_order: i32,
    /// Optional reason.
    pub comment: Option<String>,
    /// Acting user.
    pub actor_id: Option<uuid::Uuid>,
    /// When the move was committed.
    pub changed_at: DateTime<Utc>,
}

/// Query result row for status history records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = status_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatusHistoryRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Moved task.
    pub task_id: uuid::Uuid,
    /// Board scope of the task.
    pub board_id: Option<uuid::Uuid>,
    /// Status before the move.
    pub from_status_id: i32,
    /// Status after the move.
    pub to_status_id: i32,
    /// Position before the move.
    pub from_order: i32,
    /// Position after the move.
    pub to_order: i32,
    /// Optional reason.
    pub comment: Option<String>,
    /// Acting user.
    pub actor_id: Option<uuid::Uuid>,
    /// When the move was committed.
    pub changed_at: DateTime<Utc>,
}
