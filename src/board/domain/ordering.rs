//! Pure planning of the range shifts that keep positions dense.
//!
//! Every partition holds exactly the positions `0..n`. A single insertion or
//! removal at position `k` is repaired by shifting one contiguous range of
//! neighbours by one slot. Plans are values; stores execute each
//! [`RangeShift`] as a single range update in the same transaction as the
//! moved task's own update.

use super::{OrderIndex, Partition, Slot, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Direction of a range shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDelta {
    /// Every task in the range moves one slot towards the tail.
    Up,
    /// Every task in the range moves one slot towards the head.
    Down,
}

impl ShiftDelta {
    /// Returns the signed offset applied to `order_index`.
    #[must_use]
    pub const fn offset(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// A contiguous range of positions within one partition shifted by one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeShift {
    /// Partition the shift applies to.
    pub partition: Partition,
    /// First shifted position, inclusive.
    pub start: OrderIndex,
    /// Last shifted position, inclusive; `None` runs to the tail.
    pub end: Option<OrderIndex>,
    /// Direction of the shift.
    pub delta: ShiftDelta,
    /// Task left untouched even when its position falls in the range.
    pub excluding: Option<TaskId>,
}

impl RangeShift {
    /// Returns whether a task at `slot` is affected by the shift.
    #[must_use]
    pub fn contains(&self, task_id: TaskId, slot: Slot) -> bool {
        if self.excluding == Some(task_id) || slot.partition != self.partition {
            return false;
        }
        let position = slot.order_index;
        position >= self.start && self.end.is_none_or(|end| position <= end)
    }

    /// Returns the position a task at `order_index` holds after the shift.
    #[must_use]
    pub fn apply(&self, order_index: OrderIndex) -> OrderIndex {
        match self.delta {
            ShiftDelta::Up => order_index.next(),
            ShiftDelta::Down => order_index.previous().unwrap_or(OrderIndex::ZERO),
        }
    }
}

impl fmt::Display for RangeShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.delta {
            ShiftDelta::Up => '+',
            ShiftDelta::Down => '-',
        };
        match self.end {
            Some(end) => write!(f, "{} [{}, {}] {sign}1", self.partition, self.start, end),
            None => write!(f, "{} [{}, ..) {sign}1", self.partition, self.start),
        }
    }
}

/// Closes the gap left by removing the task at `removed`.
///
/// Every task after `removed` moves one slot towards the head.
#[must_use]
pub fn plan_removal(partition: Partition, removed: OrderIndex, task_id: TaskId) -> RangeShift {
    RangeShift {
        partition,
        start: removed.next(),
        end: None,
        delta: ShiftDelta::Down,
        excluding: Some(task_id),
    }
}

/// Opens a gap at `inserted` for `task_id`.
///
/// Every task at or after `inserted` moves one slot towards the tail.
#[must_use]
pub fn plan_insertion(partition: Partition, inserted: OrderIndex, task_id: TaskId) -> RangeShift {
    RangeShift {
        partition,
        start: inserted,
        end: None,
        delta: ShiftDelta::Up,
        excluding: Some(task_id),
    }
}

/// Plans a reorder of `task_id` from `from` to `to` inside one partition.
///
/// Returns `None` when the positions are equal.
#[must_use]
pub fn plan_reorder(
    partition: Partition,
    from: OrderIndex,
    to: OrderIndex,
    task_id: TaskId,
) -> Option<RangeShift> {
    if from == to {
        return None;
    }
    if from < to {
        return Some(RangeShift {
            partition,
            start: from.next(),
            end: Some(to),
            delta: ShiftDelta::Down,
            excluding: Some(task_id),
        });
    }
    Some(RangeShift {
        partition,
        start: to,
        end: from.previous(),
        delta: ShiftDelta::Up,
        excluding: Some(task_id),
    })
}

/// Behaviour when a requested position lies past the tail of a partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Place the task at the tail.
    #[default]
    Clamp,
    /// Fail with [`OrderingError::OutOfRange`].
    Reject,
}

impl OutOfRangePolicy {
    /// Returns the canonical configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clamp => "clamp",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for OutOfRangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for unrecognised out-of-range policy names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown out-of-range policy '{0}', expected 'clamp' or 'reject'")]
pub struct ParseOutOfRangePolicyError(pub String);

impl FromStr for OutOfRangePolicy {
    type Err = ParseOutOfRangePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(Self::Clamp),
            "reject" => Ok(Self::Reject),
            _ => Err(ParseOutOfRangePolicyError(value.to_owned())),
        }
    }
}

/// Errors raised while planning positions.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum OrderingError {
    /// The requested position lies past the tail under [`OutOfRangePolicy::Reject`].
    #[error("order index {requested} is out of range, partition accepts 0..={max}")]
    OutOfRange {
        /// Position the caller asked for.
        requested: OrderIndex,
        /// Largest position the partition accepts.
        max: OrderIndex,
    },

    /// The partition cannot hold another task.
    #[error("partition {0} has no free positions")]
    PartitionFull(Partition),
}

/// Complete plan for relocating one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    /// Task being relocated.
    pub task_id: TaskId,
    /// Slot the task leaves.
    pub source: Slot,
    /// Slot the task ends up in.
    pub destination: Slot,
    /// Neighbour shifts executed alongside the task's own update.
    pub shifts: Vec<RangeShift>,
}

impl MovePlan {
    /// Returns whether the task stays where it is.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }

    /// Returns whether the task changes partition.
    #[must_use]
    pub fn is_cross_partition(&self) -> bool {
        self.source.partition != self.destination.partition
    }
}

/// Plans the relocation of `task_id` from `source` to `requested` in
/// `target`.
///
/// `target_len` is the number of tasks currently in `target`, counting the
/// moving task when it is already there. Within the same partition the valid
/// range is `0..target_len`; a foreign partition also accepts the tail
/// position `target_len`.
///
/// # Errors
///
/// Returns [`OrderingError::OutOfRange`] when `requested` is past the tail and
/// the policy is [`OutOfRangePolicy::Reject`].
pub fn plan_move(
    task_id: TaskId,
    source: Slot,
    target: Partition,
    requested: OrderIndex,
    target_len: u32,
    policy: OutOfRangePolicy,
) -> Result<MovePlan, OrderingError> {
    let same_partition = source.partition == target;
    let tail = if same_partition {
        target_len.saturating_sub(1)
    } else {
        target_len
    };
    let max = OrderIndex::new(tail).map_err(|_| OrderingError::PartitionFull(target))?;
    let position = match (requested > max, policy) {
        (false, _) => requested,
        (true, OutOfRangePolicy::Clamp) => max,
        (true, OutOfRangePolicy::Reject) => {
            return Err(OrderingError::OutOfRange { requested, max });
        }
    };

    let destination = Slot::new(target, position);
    let shifts = if same_partition {
        plan_reorder(target, source.order_index, position, task_id)
            .into_iter()
            .collect()
    } else {
        vec![
            plan_removal(source.partition, source.order_index, task_id),
            plan_insertion(target, position, task_id),
        ]
    };

    Ok(MovePlan {
        task_id,
        source,
        destination,
        shifts,
    })
}

/// Returns the tail position for a task appended to a partition of
/// `partition_len` tasks.
///
/// # Errors
///
/// Returns [`OrderingError::PartitionFull`] when the position does not fit
/// the schema column.
pub fn plan_append(partition: Partition, partition_len: u32) -> Result<OrderIndex, OrderingError> {
    OrderIndex::new(partition_len).map_err(|_| OrderingError::PartitionFull(partition))
}

/// First violation of the dense-ordering invariant found in a partition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DensityViolation {
    /// Two tasks share a position.
    #[error("order index {0} is held by more than one task")]
    Duplicate(OrderIndex),
    /// A position below the partition length is unused.
    #[error("order index {0} is unused")]
    Gap(u32),
}

/// Checks that `positions` is exactly `0..n` for some `n`.
///
/// # Errors
///
/// Returns the lowest [`DensityViolation`] found.
pub fn verify_dense(
    positions: impl IntoIterator<Item = OrderIndex>,
) -> Result<(), DensityViolation> {
    let mut sorted: Vec<OrderIndex> = positions.into_iter().collect();
    sorted.sort_unstable();
    let mut expected = 0_u32;
    for position in sorted {
        let value = position.value();
        if value < expected {
            return Err(DensityViolation::Duplicate(position));
        }
        if value > expected {
            return Err(DensityViolation::Gap(expected));
        }
        expected = expected.saturating_add(1);
    }
    Ok(())
}
