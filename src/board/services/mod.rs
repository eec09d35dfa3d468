//! Application services for the task board engine.

mod audit;
mod engine;
mod error;
mod reference;
mod requests;
mod retry;

pub use audit::AuditEmitter;
pub use engine::TaskBoardService;
pub use error::{ErrorKind, InternalError, TaskBoardError, TaskBoardResult, ValidationError};
pub use reference::{ReferenceDataResolver, ReferenceError};
pub use requests::{CreateTaskRequest, MoveTaskRequest, TaskDetails, UpdateTaskRequest};
pub use retry::{RetryPolicy, retry_on_conflict};
