//! Identifier and validated scalar types for the board domain.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a task identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a task identifier from its hyphenated string form.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTaskId`] when the value is not a
    /// UUID.
    pub fn parse(value: &str) -> Result<Self, TaskDomainError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| TaskDomainError::InvalidTaskId(value.to_owned()))
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for TaskId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the board a task is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(Uuid);

impl BoardId {
    /// Creates a new random board identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a board identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for BoardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user acting on, or owning, a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Creates an actor identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! reference_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Creates a validated identifier.
            ///
            /// # Errors
            ///
            /// Returns [`TaskDomainError::InvalidReferenceId`] when the value
            /// is zero or negative.
            pub const fn new(value: i32) -> Result<Self, TaskDomainError> {
                if value <= 0 {
                    return Err(TaskDomainError::InvalidReferenceId(value));
                }
                Ok(Self(value))
            }

            /// Returns the underlying numeric value.
            #[must_use]
            pub const fn value(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

reference_id!(
    /// Identifier of a row in `task_statuses`.
    StatusId
);
reference_id!(
    /// Identifier of a row in `task_priorities`.
    PriorityId
);
reference_id!(
    /// Identifier of a row in `task_types`.
    TypeId
);

/// Zero-based position of a task within its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderIndex(u32);

impl OrderIndex {
    /// Largest position representable in the `INTEGER` schema column.
    const MAX_PERSISTED_VALUE: u32 = 0x7FFF_FFFF;

    /// The head of a partition.
    pub const ZERO: Self = Self(0);

    /// Creates a validated position.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidOrderIndex`] when the value exceeds
    /// the schema-backed maximum (`i32::MAX`).
    pub const fn new(value: u32) -> Result<Self, TaskDomainError> {
        if value > Self::MAX_PERSISTED_VALUE {
            return Err(TaskDomainError::InvalidOrderIndex(value as i64));
        }
        Ok(Self(value))
    }

    /// Creates a position from a signed request value.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidOrderIndex`] when the value is
    /// negative or does not fit the schema column.
    pub fn from_signed(value: i64) -> Result<Self, TaskDomainError> {
        let unsigned = u32::try_from(value).map_err(|_| TaskDomainError::InvalidOrderIndex(value))?;
        Self::new(unsigned)
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the position as stored in the `order_index` column.
    #[must_use]
    pub fn to_persisted(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }

    /// Reconstructs a position from the `order_index` column.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidOrderIndex`] for negative values.
    pub fn from_persisted(value: i32) -> Result<Self, TaskDomainError> {
        Self::from_signed(i64::from(value))
    }

    /// Returns the following position, saturating at the schema maximum.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.0 >= Self::MAX_PERSISTED_VALUE {
            return self;
        }
        Self(self.0 + 1)
    }

    /// Returns the preceding position, or `None` at the head.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for OrderIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
