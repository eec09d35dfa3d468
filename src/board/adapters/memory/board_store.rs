//! In-memory task and reference store for tests and embedding.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use crate::board::{
    domain::{
        DependencyEdge, Partition, RangeShift, ReferenceDraft, ReferenceEntry, ReferenceKind, Task,
        TaskEdit, TaskId,
        ordering::{plan_append, plan_move, plan_removal},
    },
    ports::{
        MoveCommand, MoveOutcome, ReferenceStore, ReferenceStoreError, ReferenceStoreResult,
        TaskStore, TaskStoreError, TaskStoreResult, TransactionBudget,
    },
};

/// Thread-safe in-memory store.
///
/// Mutations run against a copy of the whole state that replaces the shared
/// state only once every step has succeeded, so a failed operation leaves no
/// trace. The write lock is held for the duration of each mutation, which
/// makes transactions serializable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBoardStore {
    state: Arc<RwLock<BoardState>>,
    faults: Arc<Mutex<FaultPlan>>,
}

#[derive(Debug, Clone, Default)]
struct BoardState {
    tasks: HashMap<TaskId, Task>,
    edges: HashSet<DependencyEdge>,
    references: HashMap<ReferenceKind, Vec<ReferenceEntry>>,
    last_reference_id: i32,
}

#[derive(Debug, Default)]
struct FaultPlan {
    pending_conflicts: u32,
    fail_next_commit: bool,
    commit_attempts: u64,
}

impl InMemoryBoardStore {
    /// Creates an empty store with empty vocabularies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with every vocabulary seeded with its defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            for kind in ReferenceKind::ALL {
                state.seed(kind);
            }
        }
        store
    }

    /// Makes the next `count` commits fail with a serialization conflict.
    pub fn inject_conflicts(&self, count: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.pending_conflicts = count;
        }
    }

    /// Makes the next commit fail with a persistence error.
    pub fn fail_next_commit(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_next_commit = true;
        }
    }

    /// Returns how many mutating transactions reached commit.
    #[must_use]
    pub fn commit_attempts(&self) -> u64 {
        self.faults
            .lock()
            .map(|faults| faults.commit_attempts)
            .unwrap_or_default()
    }

    /// Returns the positions held in a partition, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the lock is poisoned.
    pub fn positions(&self, partition: Partition) -> TaskStoreResult<Vec<u32>> {
        let state = self.read()?;
        Ok(state
            .partition_tasks(partition)
            .iter()
            .map(|task| task.order_index().value())
            .collect())
    }

    /// Returns every partition holding at least one task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Persistence`] when the lock is poisoned.
    pub fn partitions(&self) -> TaskStoreResult<Vec<Partition>> {
        let state = self.read()?;
        let mut partitions: Vec<Partition> = state
            .tasks
            .values()
            .map(Task::partition)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        partitions.sort_unstable();
        Ok(partitions)
    }

    fn read(&self) -> TaskStoreResult<std::sync::RwLockReadGuard<'_, BoardState>> {
        self.state.read().map_err(|err| {
            TaskStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn transaction<T>(
        &self,
        budget: Option<TransactionBudget>,
        operation: impl FnOnce(&mut BoardState) -> TaskStoreResult<T>,
    ) -> TaskStoreResult<T> {
        let mut state = self.state.write().map_err(|err| {
            TaskStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let mut draft = state.clone();
        let result = operation(&mut draft)?;
        if let Some(deadline) = budget {
            deadline.ensure_remaining()?;
        }
        self.check_commit_faults()?;
        *state = draft;
        Ok(result)
    }

    fn check_commit_faults(&self) -> TaskStoreResult<()> {
        let mut faults = self.faults.lock().map_err(|err| {
            TaskStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        faults.commit_attempts = faults.commit_attempts.saturating_add(1);
        if faults.pending_conflicts > 0 {
            faults.pending_conflicts -= 1;
            return Err(TaskStoreError::SerializationConflict);
        }
        if faults.fail_next_commit {
            faults.fail_next_commit = false;
            return Err(TaskStoreError::persistence(std::io::Error::other(
                "injected commit failure",
            )));
        }
        Ok(())
    }
}

impl BoardState {
    fn has_reference(&self, kind: ReferenceKind, id: i32) -> bool {
        self.references
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|entry| entry.id == id))
    }

    fn validate_classifiers(&self, task: &Task) -> TaskStoreResult<()> {
        if !self.has_reference(ReferenceKind::Status, task.status_id().value()) {
            return Err(TaskStoreError::UnknownStatus(task.status_id()));
        }
        if !self.has_reference(ReferenceKind::Priority, task.priority_id().value()) {
            return Err(TaskStoreError::UnknownPriority(task.priority_id()));
        }
        if !self.has_reference(ReferenceKind::Type, task.type_id().value()) {
            return Err(TaskStoreError::UnknownType(task.type_id()));
        }
        Ok(())
    }

    fn partition_tasks(&self, partition: Partition) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| task.partition() == partition)
            .collect();
        tasks.sort_by_key(|task| task.order_index());
        tasks
    }

    fn partition_len(&self, partition: Partition) -> TaskStoreResult<u32> {
        let count = self
            .tasks
            .values()
            .filter(|task| task.partition() == partition)
            .count();
        u32::try_from(count).map_err(TaskStoreError::persistence)
    }

    fn apply_shift(&mut self, shift: &RangeShift) {
        for task in self.tasks.values_mut() {
            if shift.contains(task.id(), task.slot()) {
                task.shift_to(shift.apply(task.order_index()));
            }
        }
    }

    fn seed(&mut self, kind: ReferenceKind) -> usize {
        let mut inserted = 0;
        for seed in kind.defaults() {
            let exists = self
                .references
                .get(&kind)
                .is_some_and(|entries| entries.iter().any(|entry| entry.code == seed.code));
            if !exists {
                self.upsert(kind, &ReferenceDraft::from(seed));
                inserted += 1;
            }
        }
        inserted
    }

    fn upsert(&mut self, kind: ReferenceKind, draft: &ReferenceDraft) -> ReferenceEntry {
        let entries = self.references.entry(kind).or_default();
        if let Some(existing) = entries.iter_mut().find(|entry| entry.code == draft.code()) {
            existing.name = draft.name().to_owned();
            existing.description = draft.description().map(str::to_owned);
            existing.display_order = draft.display_order();
            return existing.clone();
        }
        self.last_reference_id = self.last_reference_id.saturating_add(1);
        let entry = ReferenceEntry {
            id: self.last_reference_id,
            code: draft.code().to_owned(),
            name: draft.name().to_owned(),
            description: draft.description().map(str::to_owned),
            display_order: draft.display_order(),
        };
        entries.push(entry.clone());
        entry
    }

    fn reaches(&self, from: TaskId, to: TaskId) -> bool {
        let mut pending = vec![from];
        let mut visited = HashSet::new();
        while let Some(current) = pending.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            pending.extend(
                self.edges
                    .iter()
                    .filter(|edge| edge.dependent() == current)
                    .map(|edge| edge.dependency()),
            );
        }
        false
    }
}

#[async_trait]
impl TaskStore for InMemoryBoardStore {
    async fn append(&self, task: &Task, budget: TransactionBudget) -> TaskStoreResult<Task> {
        let candidate = task.clone();
        self.transaction(Some(budget), move |state| {
            if state.tasks.contains_key(&candidate.id()) {
                return Err(TaskStoreError::DuplicateTask(candidate.id()));
            }
            state.validate_classifiers(&candidate)?;
            let partition = candidate.partition();
            let tail = plan_append(partition, state.partition_len(partition)?)?;
            let placed = candidate.placed_at(tail);
            state.tasks.insert(placed.id(), placed.clone());
            Ok(placed)
        })
    }

    async fn move_task(&self, command: MoveCommand) -> TaskStoreResult<MoveOutcome> {
        self.transaction(Some(command.budget), move |state| {
            let mut task = state
                .tasks
                .get(&command.task_id)
                .cloned()
                .ok_or(TaskStoreError::NotFound(command.task_id))?;
            if !state.has_reference(ReferenceKind::Status, command.target_status.value()) {
                return Err(TaskStoreError::UnknownStatus(command.target_status));
            }
            if !state.has_reference(ReferenceKind::Type, command.type_id.value()) {
                return Err(TaskStoreError::UnknownType(command.type_id));
            }

            let target = task.partition().with_status(command.target_status);
            let plan = plan_move(
                task.id(),
                task.slot(),
                target,
                command.target_order,
                state.partition_len(target)?,
                command.policy,
            )?;
            for shift in &plan.shifts {
                state.apply_shift(shift);
            }
            task.relocate(plan.destination, command.type_id, command.moved_at);
            state.tasks.insert(task.id(), task.clone());
            Ok(MoveOutcome { task, plan })
        })
    }

    async fn update(&self, task_id: TaskId, edit: &TaskEdit) -> TaskStoreResult<Task> {
        let pending = edit.clone();
        self.transaction(None, move |state| {
            let mut task = state
                .tasks
                .get(&task_id)
                .cloned()
                .ok_or(TaskStoreError::NotFound(task_id))?;
            task.apply_edit(pending);
            state.validate_classifiers(&task)?;
            state.tasks.insert(task_id, task.clone());
            Ok(task)
        })
    }

    async fn delete(&self, task_id: TaskId, budget: TransactionBudget) -> TaskStoreResult<Task> {
        self.transaction(Some(budget), move |state| {
            let task = state
                .tasks
                .remove(&task_id)
                .ok_or(TaskStoreError::NotFound(task_id))?;
            let inbound = state
                .edges
                .iter()
                .filter(|edge| edge.dependency() == task_id)
                .count();
            if inbound > 0 {
                return Err(TaskStoreError::DependentsExist {
                    task_id,
                    dependent_count: u64::try_from(inbound).map_err(TaskStoreError::persistence)?,
                });
            }
            state.edges.retain(|edge| !edge.touches(task_id));
            state.apply_shift(&plan_removal(task.partition(), task.order_index(), task_id));
            Ok(task)
        })
    }

    async fn find_by_id(&self, task_id: TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&task_id).cloned())
    }

    async fn list_partition(&self, partition: Partition) -> TaskStoreResult<Vec<Task>> {
        let state = self.read()?;
        Ok(state
            .partition_tasks(partition)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn count_dependents(&self, task_id: TaskId) -> TaskStoreResult<u64> {
        let state = self.read()?;
        let count = state
            .edges
            .iter()
            .filter(|edge| edge.dependency() == task_id)
            .count();
        u64::try_from(count).map_err(TaskStoreError::persistence)
    }

    async fn add_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<()> {
        self.transaction(None, move |state| {
            for end in [edge.dependent(), edge.dependency()] {
                if !state.tasks.contains_key(&end) {
                    return Err(TaskStoreError::NotFound(end));
                }
            }
            if state.edges.contains(&edge) {
                return Ok(());
            }
            if state.reaches(edge.dependency(), edge.dependent()) {
                return Err(TaskStoreError::DependencyCycle(edge));
            }
            state.edges.insert(edge);
            Ok(())
        })
    }

    async fn remove_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<bool> {
        self.transaction(None, move |state| Ok(state.edges.remove(&edge)))
    }

    async fn dependencies_of(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskId>> {
        let state = self.read()?;
        let mut dependencies: Vec<TaskId> = state
            .edges
            .iter()
            .filter(|edge| edge.dependent() == task_id)
            .map(|edge| edge.dependency())
            .collect();
        dependencies.sort_unstable();
        Ok(dependencies)
    }
}

#[async_trait]
impl ReferenceStore for InMemoryBoardStore {
    async fn list_entries(&self, kind: ReferenceKind) -> ReferenceStoreResult<Vec<ReferenceEntry>> {
        let state = self.state.read().map_err(|err| {
            ReferenceStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.references.get(&kind).cloned().unwrap_or_default())
    }

    async fn seed_defaults(&self, kind: ReferenceKind) -> ReferenceStoreResult<usize> {
        let mut state = self.state.write().map_err(|err| {
            ReferenceStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.seed(kind))
    }

    async fn save_entry(
        &self,
        kind: ReferenceKind,
        draft: &ReferenceDraft,
    ) -> ReferenceStoreResult<ReferenceEntry> {
        let mut state = self.state.write().map_err(|err| {
            ReferenceStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.upsert(kind, draft))
    }
}
