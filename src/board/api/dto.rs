//! Request and response bodies for the task endpoints.

use crate::board::{
    domain::{ActorId, BoardId, OrderIndex, StatusId, TaskContent, TaskId},
    services::{
        CreateTaskRequest, MoveTaskRequest, TaskDetails, UpdateTaskRequest, ValidationError,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parses the `{id}` path segment.
///
/// # Errors
///
/// Returns [`ValidationError::Domain`] when the segment is not a UUID.
pub fn parse_task_id(raw: &str) -> Result<TaskId, ValidationError> {
    Ok(TaskId::parse(raw)?)
}

/// Body of `PUT /tasks/{id}/move`.
///
/// Every field is optional at the serde level so that missing values are
/// reported as validation errors naming the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTaskBody {
    /// Destination status column.
    #[serde(default)]
    pub status_id: Option<i32>,
    /// Destination position, zero-based.
    #[serde(default)]
    pub order: Option<i64>,
    /// Status the client last saw the task in; zero means unknown.
    #[serde(default)]
    pub previous_status_id: Option<i32>,
    /// Type code; blank selects the default type.
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
    /// Reason recorded with the status change.
    #[serde(default)]
    pub comment: Option<String>,
}

impl MoveTaskBody {
    /// Validates the body into a move command for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when `status_id` or `order`
    /// is absent and [`ValidationError::Domain`] when either is out of range.
    pub fn into_request(
        self,
        task_id: TaskId,
        actor: Option<ActorId>,
    ) -> Result<MoveTaskRequest, ValidationError> {
        let raw_status = self
            .status_id
            .ok_or(ValidationError::MissingField("status_id"))?;
        let raw_order = self.order.ok_or(ValidationError::MissingField("order"))?;
        let mut request = MoveTaskRequest::new(
            task_id,
            StatusId::new(raw_status)?,
            OrderIndex::from_signed(raw_order)?,
        );
        if let Some(previous) = self.previous_status_id.filter(|id| *id != 0) {
            request = request.from_status(StatusId::new(previous)?);
        }
        if let Some(code) = non_blank(self.task_type) {
            request = request.with_type(code);
        }
        if let Some(comment) = non_blank(self.comment) {
            request = request.with_comment(comment);
        }
        if let Some(actor_id) = actor {
            request = request.by(actor_id);
        }
        Ok(request)
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskBody {
    /// Task title.
    #[serde(default)]
    pub title: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial status column; first column when absent or zero.
    #[serde(default)]
    pub status_id: Option<i32>,
    /// Priority code.
    #[serde(default)]
    pub priority: Option<String>,
    /// Type code.
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
    /// Board scope.
    #[serde(default)]
    pub board_id: Option<Uuid>,
    /// Content block.
    #[serde(default)]
    pub content: Option<TaskContent>,
}

impl CreateTaskBody {
    /// Validates the body into a creation command.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] without a title and
    /// [`ValidationError::Domain`] for a negative status.
    pub fn into_request(self, owner: Option<ActorId>) -> Result<CreateTaskRequest, ValidationError> {
        let title = self.title.ok_or(ValidationError::MissingField("title"))?;
        let mut request = CreateTaskRequest::new(title);
        if let Some(description) = self.description {
            request = request.with_description(description);
        }
        if let Some(status) = self.status_id.filter(|id| *id != 0) {
            request = request.with_status(StatusId::new(status)?);
        }
        if let Some(code) = non_blank(self.priority) {
            request = request.with_priority(code);
        }
        if let Some(code) = non_blank(self.task_type) {
            request = request.with_type(code);
        }
        if let Some(board) = self.board_id {
            request = request.on_board(BoardId::from_uuid(board));
        }
        if let Some(owner_id) = owner {
            request = request.owned_by(owner_id);
        }
        if let Some(content) = self.content {
            request = request.with_content(content);
        }
        Ok(request)
    }
}

/// Body of `PATCH /tasks/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskBody {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New priority code.
    #[serde(default)]
    pub priority: Option<String>,
    /// New type code.
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
    /// Replacement content block.
    #[serde(default)]
    pub content: Option<TaskContent>,
}

impl UpdateTaskBody {
    /// Converts the body into an edit of `task_id`.
    #[must_use]
    pub fn into_request(self, task_id: TaskId) -> UpdateTaskRequest {
        let mut request = UpdateTaskRequest::new(task_id);
        if let Some(title) = self.title {
            request = request.with_title(title);
        }
        if let Some(description) = self.description {
            request = request.with_description(description);
        }
        if let Some(code) = self.priority {
            request = request.with_priority(code);
        }
        if let Some(code) = self.task_type {
            request = request.with_type(code);
        }
        if let Some(content) = self.content {
            request = request.with_content(content);
        }
        request
    }
}

/// Task representation returned by the task endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task identifier.
    pub id: TaskId,
    /// Title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Status column.
    pub status_id: i32,
    /// Status display name.
    pub status_name: Option<String>,
    /// Priority classifier.
    pub priority_id: i32,
    /// Priority display name.
    pub priority_name: Option<String>,
    /// Type classifier.
    pub type_id: i32,
    /// Type display name.
    pub type_name: Option<String>,
    /// Board scope.
    pub board_id: Option<BoardId>,
    /// Creator.
    pub owner_id: Option<ActorId>,
    /// Position within the partition.
    pub order_index: u32,
    /// Content block.
    pub content: TaskContent,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&TaskDetails> for TaskView {
    fn from(details: &TaskDetails) -> Self {
        let task = &details.task;
        Self {
            id: task.id(),
            title: task.title().as_str().to_owned(),
            description: task.description().to_owned(),
            status_id: task.status_id().value(),
            status_name: details.status.as_ref().map(|entry| entry.name.clone()),
            priority_id: task.priority_id().value(),
            priority_name: details.priority.as_ref().map(|entry| entry.name.clone()),
            type_id: task.type_id().value(),
            type_name: details.task_type.as_ref().map(|entry| entry.name.clone()),
            board_id: task.board_id(),
            owner_id: task.owner_id(),
            order_index: task.order_index().value(),
            content: task.content().clone(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
