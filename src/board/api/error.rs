//! Machine-readable error payload.

use crate::board::{
    domain::TaskDomainError,
    services::{ErrorKind, TaskBoardError, ValidationError},
};
use serde::Serialize;
use serde_json::{Value, json};

/// JSON error body returned alongside [`ErrorBody::status_code`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Failure category.
    pub kind: ErrorKind,
    /// Identifiers and attempted values relevant to the failure.
    pub details: Value,
}

impl ErrorBody {
    /// Returns the HTTP status code for the body.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.http_status()
    }
}

impl From<&TaskBoardError> for ErrorBody {
    fn from(err: &TaskBoardError) -> Self {
        let kind = err.kind();
        match err {
            TaskBoardError::Validation(validation) => Self {
                error: validation.to_string(),
                kind,
                details: validation_details(validation),
            },
            TaskBoardError::NotFound(task_id) => Self {
                error: err.to_string(),
                kind,
                details: json!({ "task_id": task_id }),
            },
            TaskBoardError::DependentsExist {
                task_id,
                dependent_count,
            } => Self {
                error: err.to_string(),
                kind,
                details: json!({ "task_id": task_id, "dependent_count": dependent_count }),
            },
            TaskBoardError::Internal {
                operation, task_id, ..
            } => Self {
                error: format!("internal error during {operation}"),
                kind,
                details: json!({ "operation": operation, "task_id": task_id }),
            },
        }
    }
}

fn validation_details(err: &ValidationError) -> Value {
    match err {
        ValidationError::Domain(domain) => domain_details(domain),
        ValidationError::MissingField(field) => json!({ "field": field }),
        ValidationError::UnknownStatus(status_id) => json!({ "status_id": status_id }),
        ValidationError::UnknownPriority(priority_id) => json!({ "priority_id": priority_id }),
        ValidationError::UnknownType(type_id) => json!({ "type_id": type_id }),
        ValidationError::UnknownCode { kind, code } => {
            json!({ "kind": kind.as_str(), "code": code })
        }
        ValidationError::OrderOutOfRange { requested, max } => {
            json!({ "requested": requested, "max": max })
        }
        ValidationError::PartitionFull(partition) => {
            json!({ "partition": partition.to_string() })
        }
        ValidationError::DependencyCycle(edge) => {
            json!({ "dependent": edge.dependent(), "dependency": edge.dependency() })
        }
    }
}

fn domain_details(err: &TaskDomainError) -> Value {
    match err {
        TaskDomainError::InvalidTaskId(raw) => json!({ "field": "task_id", "value": raw }),
        TaskDomainError::EmptyTitle => json!({ "field": "title" }),
        TaskDomainError::TitleTooLong { max, actual } => {
            json!({ "field": "title", "max": max, "actual": actual })
        }
        TaskDomainError::InvalidReferenceId(id) => json!({ "value": id }),
        TaskDomainError::EmptyReferenceCode => json!({ "field": "code" }),
        TaskDomainError::InvalidOrderIndex(order) => json!({ "field": "order", "value": order }),
        TaskDomainError::SelfDependency(task_id) => json!({ "task_id": task_id }),
    }
}
