//! Fixed vocabularies: statuses, priorities and types.

use super::{ParseReferenceKindError, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One of the reference vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Status columns of a board.
    Status,
    /// Task priorities.
    Priority,
    /// Task types.
    Type,
}

impl ReferenceKind {
    /// All vocabularies in seeding order.
    pub const ALL: [Self; 3] = [Self::Status, Self::Priority, Self::Type];

    /// Returns the backing table.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Status => "task_statuses",
            Self::Priority => "task_priorities",
            Self::Type => "task_types",
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Type => "type",
        }
    }

    /// Returns the code preferred as a default, when the vocabulary has one.
    #[must_use]
    pub const fn default_code(self) -> Option<&'static str> {
        match self {
            Self::Status => None,
            Self::Priority => Some("medium"),
            Self::Type => Some("feature"),
        }
    }

    /// Returns the rows upserted when the vocabulary is empty.
    #[must_use]
    pub const fn defaults(self) -> &'static [ReferenceSeed] {
        match self {
            Self::Status => STATUS_DEFAULTS,
            Self::Priority => PRIORITY_DEFAULTS,
            Self::Type => TYPE_DEFAULTS,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = ParseReferenceKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "status" | "statuses" => Ok(Self::Status),
            "priority" | "priorities" => Ok(Self::Priority),
            "type" | "types" => Ok(Self::Type),
            _ => Err(ParseReferenceKindError(value.to_owned())),
        }
    }
}

/// A compiled-in default vocabulary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSeed {
    /// Unique code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Position in pickers.
    pub display_order: i32,
}

const fn seed(
    code: &'static str,
    name: &'static str,
    description: &'static str,
    display_order: i32,
) -> ReferenceSeed {
    ReferenceSeed {
        code,
        name,
        description,
        display_order,
    }
}

const STATUS_DEFAULTS: &[ReferenceSeed] = &[
    seed("backlog", "Backlog", "Captured but not yet planned", 1),
    seed("todo", "To Do", "Planned and ready to start", 2),
    seed("in_progress", "In Progress", "Actively being worked on", 3),
    seed("blocked", "Blocked", "Waiting on something else", 4),
    seed("done", "Done", "Completed", 5),
];

const PRIORITY_DEFAULTS: &[ReferenceSeed] = &[
    seed("low", "Low", "Can wait", 1),
    seed("medium", "Medium", "Normal priority", 2),
    seed("high", "High", "Should be picked up next", 3),
    seed("critical", "Critical", "Drop everything", 4),
];

const TYPE_DEFAULTS: &[ReferenceSeed] = &[
    seed("feature", "Feature", "New functionality", 1),
    seed("bug", "Bug", "Something is broken", 2),
    seed("docs", "Documentation", "Documentation work", 3),
    seed("chore", "Chore", "Maintenance work", 4),
];

/// Normalises a vocabulary code to trimmed lowercase.
///
/// # Errors
///
/// Returns [`TaskDomainError::EmptyReferenceCode`] for blank input.
pub fn normalize_code(code: &str) -> Result<String, TaskDomainError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(TaskDomainError::EmptyReferenceCode);
    }
    Ok(trimmed.to_lowercase())
}

/// A persisted vocabulary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Row identifier.
    pub id: i32,
    /// Unique code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Position in pickers.
    pub display_order: i32,
}

/// Values for inserting or updating a vocabulary row keyed by code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDraft {
    code: String,
    name: String,
    description: Option<String>,
    display_order: i32,
}

impl ReferenceDraft {
    /// Creates a draft with a normalised code.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyReferenceCode`] for a blank code.
    pub fn new(
        code: &str,
        name: impl Into<String>,
        display_order: i32,
    ) -> Result<Self, TaskDomainError> {
        Ok(Self {
            code: normalize_code(code)?,
            name: name.into(),
            description: None,
            display_order,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the normalised code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the display order.
    #[must_use]
    pub const fn display_order(&self) -> i32 {
        self.display_order
    }
}

impl From<&ReferenceSeed> for ReferenceDraft {
    fn from(value: &ReferenceSeed) -> Self {
        Self {
            code: value.code.to_owned(),
            name: value.name.to_owned(),
            description: Some(value.description.to_owned()),
            display_order: value.display_order,
        }
    }
}

/// Snapshot of one vocabulary indexed by id and code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
    by_id: HashMap<i32, usize>,
    by_code: HashMap<String, usize>,
}

impl ReferenceCatalog {
    /// Builds a catalog ordered by display order, then id.
    #[must_use]
    pub fn new(mut entries: Vec<ReferenceEntry>) -> Self {
        entries.sort_by_key(|entry| (entry.display_order, entry.id));
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_code = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            by_id.insert(entry.id, position);
            by_code.insert(entry.code.to_lowercase(), position);
        }
        Self {
            entries,
            by_id,
            by_code,
        }
    }

    /// Looks an entry up by code, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&ReferenceEntry> {
        let key = code.trim().to_lowercase();
        self.by_code
            .get(&key)
            .and_then(|position| self.entries.get(*position))
    }

    /// Looks an entry up by id.
    #[must_use]
    pub fn by_id(&self, id: i32) -> Option<&ReferenceEntry> {
        self.by_id
            .get(&id)
            .and_then(|position| self.entries.get(*position))
    }

    /// Returns the entry with the lowest display order.
    #[must_use]
    pub fn first(&self) -> Option<&ReferenceEntry> {
        self.entries.first()
    }

    /// Returns whether the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }
}
