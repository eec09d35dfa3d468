//! Boundary types for an HTTP routing layer.
//!
//! No router lives here: handlers decode these bodies, call
//! [`crate::board::services::TaskBoardService`] and encode [`TaskView`] or
//! [`ErrorBody`].

mod dto;
mod error;

pub use dto::{CreateTaskBody, MoveTaskBody, TaskView, UpdateTaskBody, parse_task_id};
pub use error::ErrorBody;
