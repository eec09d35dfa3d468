//! Domain model for task positions, status transitions and reference data.
//!
//! Everything here is pure: ordering plans are computed as values and
//! executed by adapters, so the dense-ordering rules can be tested without
//! storage.

mod audit;
mod content;
mod dependency;
mod error;
mod ids;
pub mod ordering;
mod reference;
mod task;

pub use audit::{AuditAction, AuditEntry, StatusChange, StatusHistoryRecord, TaskEvent};
pub use content::{AcceptanceCriterion, TaskContent};
pub use dependency::DependencyEdge;
pub use error::{ParseReferenceKindError, TaskDomainError};
pub use ids::{ActorId, BoardId, OrderIndex, PriorityId, StatusId, TaskId, TypeId};
pub use ordering::{MovePlan, OrderingError, OutOfRangePolicy, RangeShift, ShiftDelta};
pub use reference::{
    ReferenceCatalog, ReferenceDraft, ReferenceEntry, ReferenceKind, ReferenceSeed, normalize_code,
};
pub use task::{NewTask, Partition, PersistedTaskData, Slot, Task, TaskEdit, TaskTitle};
