//! Free-form content block attached to each task.

use super::ActorId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Description, acceptance criteria and attachments of a task.
///
/// Persisted as a single JSONB document; the engine never interprets it
/// beyond keeping acceptance criteria in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContent {
    /// Long-form description.
    #[serde(default)]
    pub description: String,
    /// Acceptance criteria in display order.
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    /// Implementation notes for whoever picks the task up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_details: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Attachment locations.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Optional assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ActorId>,
}

impl TaskContent {
    /// Creates content with only a description.
    #[must_use]
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Adds an acceptance criterion and renumbers the list by display order.
    #[must_use]
    pub fn with_criterion(mut self, criterion: AcceptanceCriterion) -> Self {
        self.acceptance_criteria.push(criterion);
        self.normalize_criteria_order();
        self
    }

    /// Returns `(completed, total)` acceptance criteria counts.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        let completed = self
            .acceptance_criteria
            .iter()
            .filter(|criterion| criterion.completed)
            .count();
        (completed, self.acceptance_criteria.len())
    }

    /// Marks the criterion with the given id as completed.
    ///
    /// Returns `false` when no criterion matches.
    pub fn complete_criterion(
        &mut self,
        criterion_id: Uuid,
        completed_by: Option<ActorId>,
        clock: &impl Clock,
    ) -> bool {
        let Some(criterion) = self
            .acceptance_criteria
            .iter_mut()
            .find(|criterion| criterion.id == criterion_id)
        else {
            return false;
        };
        let now = clock.utc();
        criterion.completed = true;
        criterion.completed_at = Some(now);
        criterion.completed_by = completed_by;
        criterion.updated_at = now;
        true
    }

    /// Sorts criteria by their display order and renumbers them densely.
    pub fn normalize_criteria_order(&mut self) {
        self.acceptance_criteria.sort_by_key(|criterion| criterion.order);
        for (position, criterion) in self.acceptance_criteria.iter_mut().enumerate() {
            criterion.order = u32::try_from(position).unwrap_or(u32::MAX);
        }
    }
}

/// A single acceptance criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    /// Criterion identifier.
    pub id: Uuid,
    /// What must hold for the task to be accepted.
    pub description: String,
    /// Whether the criterion has been met.
    #[serde(default)]
    pub completed: bool,
    /// When the criterion was met.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Who marked the criterion as met.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<ActorId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Display order within the task.
    #[serde(default)]
    pub order: u32,
    /// Optional grouping label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Optional notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AcceptanceCriterion {
    /// Creates an open criterion placed at `order`.
    #[must_use]
    pub fn new(description: impl Into<String>, order: u32, clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            completed: false,
            completed_at: None,
            completed_by: None,
            created_at: now,
            updated_at: now,
            order,
            category: None,
            notes: None,
        }
    }

    /// Sets the grouping label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
