//! Orchestration of task creation, relocation, edits and deletion.

use super::{
    audit::AuditEmitter,
    error::{TaskBoardError, TaskBoardResult},
    reference::{ReferenceDataResolver, ReferenceError},
    requests::{CreateTaskRequest, MoveTaskRequest, TaskDetails, UpdateTaskRequest},
    retry::retry_on_conflict,
};
use crate::board::{
    domain::{
        ActorId, DependencyEdge, NewTask, Partition, ReferenceDraft, ReferenceEntry,
        ReferenceKind, StatusChange, StatusHistoryRecord, StatusId, Task, TaskContent, TaskEdit,
        TaskEvent, TaskId, TaskTitle,
    },
    ports::{AuditSink, AuditSinkError, MoveCommand, ReferenceStore, TaskStore, TaskStoreError},
};
use crate::config::EngineConfig;
use mockable::Clock;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Operation context attached to failures before they leave the service.
#[derive(Debug, Clone, Copy)]
struct OpContext {
    operation: &'static str,
    task_id: Option<TaskId>,
    target_status: Option<StatusId>,
}

impl OpContext {
    const fn new(operation: &'static str) -> Self {
        Self {
            operation,
            task_id: None,
            target_status: None,
        }
    }

    const fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    const fn targeting(mut self, status_id: StatusId) -> Self {
        self.target_status = Some(status_id);
        self
    }

    fn store(self, err: TaskStoreError) -> TaskBoardError {
        self.report(TaskBoardError::from_store(err, self.operation, self.task_id))
    }

    fn reference(self, err: ReferenceError) -> TaskBoardError {
        self.report(TaskBoardError::from_reference(
            err,
            self.operation,
            self.task_id,
        ))
    }

    fn audit(self, err: AuditSinkError) -> TaskBoardError {
        self.report(TaskBoardError::Internal {
            operation: self.operation,
            task_id: self.task_id,
            source: err.into(),
        })
    }

    fn report(self, err: TaskBoardError) -> TaskBoardError {
        if let TaskBoardError::Internal { source, .. } = &err {
            error!(
                operation = self.operation,
                task_id = ?self.task_id,
                target_status = ?self.target_status,
                error = %source,
                "board operation failed"
            );
        }
        err
    }
}

/// Task board orchestration service.
///
/// Mutations run through the store's serializable transactions, are retried
/// on serialization conflicts according to [`EngineConfig::retry`] and emit
/// an audit entry once committed.
pub struct TaskBoardService<S, A, C>
where
    S: TaskStore + ReferenceStore + 'static,
    A: AuditSink + 'static,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    references: ReferenceDataResolver<S>,
    audit: AuditEmitter<A>,
    clock: Arc<C>,
    config: EngineConfig,
}

impl<S, A, C> TaskBoardService<S, A, C>
where
    S: TaskStore + ReferenceStore + 'static,
    A: AuditSink + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, audit_sink: Arc<A>, clock: Arc<C>) -> Self {
        Self {
            references: ReferenceDataResolver::new(Arc::clone(&store)),
            store,
            audit: AuditEmitter::new(audit_sink),
            clock,
            config: EngineConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the reference data resolver.
    #[must_use]
    pub const fn references(&self) -> &ReferenceDataResolver<S> {
        &self.references
    }

    /// Creates a task at the tail of its partition.
    ///
    /// Omitted status, priority and type resolve to the vocabulary defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Validation`] for an invalid title, unknown
    /// codes or a dangling status, and [`TaskBoardError::Internal`] when the
    /// store fails.
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskBoardResult<TaskDetails> {
        let context = OpContext::new("create_task");
        let title = TaskTitle::new(request.title)?;
        let status_id = match request.status_id {
            Some(status_id) => status_id,
            None => self
                .references
                .default_status()
                .await
                .map_err(|err| context.reference(err))?,
        };
        let scoped = context.targeting(status_id);
        let priority_id = self
            .references
            .resolve_priority(request.priority_code.as_deref())
            .await
            .map_err(|err| scoped.reference(err))?;
        let type_id = self
            .references
            .resolve_type(request.type_code.as_deref())
            .await
            .map_err(|err| scoped.reference(err))?;

        let draft = Task::new(
            NewTask {
                title,
                description: request.description,
                status_id,
                priority_id,
                type_id,
                board_id: request.board_id,
                owner_id: request.owner_id,
                content: normalized(request.content),
            },
            &*self.clock,
        );
        let attempt = scoped.for_task(draft.id());
        let pending = &draft;
        let stored = retry_on_conflict(self.config.retry, move || {
            self.store.append(pending, self.config.budget())
        })
        .await
        .map_err(|err| attempt.store(err))?;

        info!(
            task_id = %stored.id(),
            partition = %stored.partition(),
            order = %stored.order_index(),
            "created task"
        );
        self.audit.emit(
            TaskEvent::Created {
                task_id: stored.id(),
                slot: stored.slot(),
                actor: stored.owner_id(),
            },
            &*self.clock,
        );
        self.details(stored, attempt).await
    }

    /// Relocates a task to a position in a status column.
    ///
    /// The source slot is read from the locked row, so a stale
    /// `previous_status` only produces a warning. Neighbours in both affected
    /// partitions are shifted in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::NotFound`] for a missing task,
    /// [`TaskBoardError::Validation`] for an unknown status or type or a
    /// rejected position, and [`TaskBoardError::Internal`] when the
    /// transaction fails for good. Nothing is written on error.
    pub async fn move_task(&self, request: MoveTaskRequest) -> TaskBoardResult<TaskDetails> {
        let context = OpContext::new("move_task")
            .for_task(request.task_id)
            .targeting(request.target_status);
        let type_id = self
            .references
            .resolve_type(request.type_code.as_deref())
            .await
            .map_err(|err| context.reference(err))?;

        let outcome = retry_on_conflict(self.config.retry, move || {
            self.store.move_task(MoveCommand {
                task_id: request.task_id,
                target_status: request.target_status,
                target_order: request.target_order,
                type_id,
                policy: self.config.out_of_range_policy,
                moved_at: self.clock.utc(),
                budget: self.config.budget(),
            })
        })
        .await
        .map_err(|err| context.store(err))?;

        let plan = &outcome.plan;
        if let Some(expected) = request.previous_status
            && expected != plan.source.partition.status_id
        {
            warn!(
                task_id = %request.task_id,
                expected_status = %expected,
                actual_status = %plan.source.partition.status_id,
                "move issued against a stale view of the task"
            );
        }
        if request.target_order != plan.destination.order_index {
            info!(
                task_id = %request.task_id,
                requested = %request.target_order,
                placed = %plan.destination.order_index,
                "clamped move target to partition tail"
            );
        }
        info!(
            task_id = %request.task_id,
            from_partition = %plan.source.partition,
            from_order = %plan.source.order_index,
            to_partition = %plan.destination.partition,
            to_order = %plan.destination.order_index,
            shifts = plan.shifts.len(),
            "moved task"
        );

        let change = StatusChange {
            task_id: request.task_id,
            board_id: outcome.task.board_id(),
            from_status: plan.source.partition.status_id,
            to_status: plan.destination.partition.status_id,
            from_order: plan.source.order_index,
            to_order: plan.destination.order_index,
            comment: request.comment,
            actor: request.actor,
        };
        self.audit.emit(TaskEvent::Moved(change), &*self.clock);
        self.details(outcome.task, context).await
    }

    /// Edits the title, description, classifiers or content of a task.
    ///
    /// Position and status only change through [`Self::move_task`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::NotFound`] for a missing task and
    /// [`TaskBoardError::Validation`] for invalid values.
    pub async fn update_task(&self, request: UpdateTaskRequest) -> TaskBoardResult<TaskDetails> {
        let context = OpContext::new("update_task").for_task(request.task_id);
        if request.is_empty() {
            return self.get_task(request.task_id).await;
        }
        let mut edit = TaskEdit::new(&*self.clock);
        if let Some(title) = request.title {
            edit.title = Some(TaskTitle::new(title)?);
        }
        edit.description = request.description;
        if let Some(code) = request.priority_code.as_deref() {
            let priority_id = self
                .references
                .resolve_priority(Some(code))
                .await
                .map_err(|err| context.reference(err))?;
            edit.priority_id = Some(priority_id);
        }
        if let Some(code) = request.type_code.as_deref() {
            let type_id = self
                .references
                .resolve_type(Some(code))
                .await
                .map_err(|err| context.reference(err))?;
            edit.type_id = Some(type_id);
        }
        edit.content = request.content;

        let pending = &edit;
        let stored = retry_on_conflict(self.config.retry, move || {
            self.store.update(request.task_id, pending)
        })
        .await
        .map_err(|err| context.store(err))?;
        info!(task_id = %request.task_id, "updated task");
        self.details(stored, context).await
    }

    /// Deletes a task nothing depends on and closes the gap it leaves.
    ///
    /// Returns the task as it was before deletion.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::DependentsExist`] with the exact number of
    /// inbound edges, [`TaskBoardError::NotFound`] for a missing task and
    /// [`TaskBoardError::Internal`] when the store fails.
    pub async fn delete_task(
        &self,
        task_id: TaskId,
        actor: Option<ActorId>,
    ) -> TaskBoardResult<Task> {
        let context = OpContext::new("delete_task").for_task(task_id);
        let dependent_count = self
            .store
            .count_dependents(task_id)
            .await
            .map_err(|err| context.store(err))?;
        if dependent_count > 0 {
            info!(%task_id, dependent_count, "refused to delete task with dependents");
            return Err(TaskBoardError::DependentsExist {
                task_id,
                dependent_count,
            });
        }

        let removed = retry_on_conflict(self.config.retry, move || {
            self.store.delete(task_id, self.config.budget())
        })
        .await
        .map_err(|err| context.store(err))?;
        info!(
            %task_id,
            partition = %removed.partition(),
            order = %removed.order_index(),
            "deleted task"
        );
        self.audit.emit(
            TaskEvent::Deleted {
                task_id,
                slot: removed.slot(),
                actor,
            },
            &*self.clock,
        );
        Ok(removed)
    }

    /// Returns a task with its resolved reference entries.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::NotFound`] for a missing task.
    pub async fn get_task(&self, task_id: TaskId) -> TaskBoardResult<TaskDetails> {
        let context = OpContext::new("get_task").for_task(task_id);
        let task = self.require_task(task_id, context).await?;
        self.details(task, context).await
    }

    /// Returns the status transitions recorded for a task, newest first.
    ///
    /// Transitions are written after commit, so a move that just returned
    /// may not be listed yet. History outlives the task it describes.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when the audit log cannot be read.
    pub async fn status_history(
        &self,
        task_id: TaskId,
    ) -> TaskBoardResult<Vec<StatusHistoryRecord>> {
        let context = OpContext::new("status_history").for_task(task_id);
        self.audit
            .sink()
            .history(task_id)
            .await
            .map_err(|err| context.audit(err))
    }

    /// Returns the tasks of a partition in position order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when the store fails.
    pub async fn list_partition(&self, partition: Partition) -> TaskBoardResult<Vec<Task>> {
        let context = OpContext::new("list_partition").targeting(partition.status_id);
        self.store
            .list_partition(partition)
            .await
            .map_err(|err| context.store(err))
    }

    /// Counts the tasks that depend on `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when the store fails.
    pub async fn count_dependents(&self, task_id: TaskId) -> TaskBoardResult<u64> {
        let context = OpContext::new("count_dependents").for_task(task_id);
        self.store
            .count_dependents(task_id)
            .await
            .map_err(|err| context.store(err))
    }

    /// Records that `dependent` waits on `dependency`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Validation`] for self-edges or edges closing
    /// a cycle and [`TaskBoardError::NotFound`] when either task is missing.
    pub async fn add_dependency(&self, dependent: TaskId, dependency: TaskId) -> TaskBoardResult<()> {
        let context = OpContext::new("add_dependency").for_task(dependent);
        let edge = DependencyEdge::new(dependent, dependency)?;
        retry_on_conflict(self.config.retry, move || self.store.add_dependency(edge))
            .await
            .map_err(|err| context.store(err))?;
        info!(%dependent, %dependency, "recorded task dependency");
        Ok(())
    }

    /// Removes a dependency edge, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Validation`] for self-edges and
    /// [`TaskBoardError::Internal`] when the store fails.
    pub async fn remove_dependency(
        &self,
        dependent: TaskId,
        dependency: TaskId,
    ) -> TaskBoardResult<bool> {
        let context = OpContext::new("remove_dependency").for_task(dependent);
        let edge = DependencyEdge::new(dependent, dependency)?;
        retry_on_conflict(self.config.retry, move || self.store.remove_dependency(edge))
            .await
            .map_err(|err| context.store(err))
    }

    /// Returns the tasks `task_id` depends on.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when the store fails.
    pub async fn dependencies_of(&self, task_id: TaskId) -> TaskBoardResult<Vec<TaskId>> {
        let context = OpContext::new("dependencies_of").for_task(task_id);
        self.store
            .dependencies_of(task_id)
            .await
            .map_err(|err| context.store(err))
    }

    /// Returns the status columns in display order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when loading fails.
    pub async fn list_statuses(&self) -> TaskBoardResult<Vec<ReferenceEntry>> {
        self.list_reference(ReferenceKind::Status).await
    }

    /// Returns the priorities in display order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when loading fails.
    pub async fn list_priorities(&self) -> TaskBoardResult<Vec<ReferenceEntry>> {
        self.list_reference(ReferenceKind::Priority).await
    }

    /// Returns the task types in display order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when loading fails.
    pub async fn list_types(&self) -> TaskBoardResult<Vec<ReferenceEntry>> {
        self.list_reference(ReferenceKind::Type).await
    }

    /// Seeds every empty vocabulary, returning the number of inserted rows.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when seeding fails.
    pub async fn ensure_defaults(&self) -> TaskBoardResult<usize> {
        let context = OpContext::new("ensure_defaults");
        self.references
            .ensure_defaults()
            .await
            .map_err(|err| context.reference(err))
    }

    /// Inserts or updates a vocabulary entry keyed by code.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBoardError::Internal`] when the store rejects the entry.
    pub async fn save_reference(
        &self,
        kind: ReferenceKind,
        draft: &ReferenceDraft,
    ) -> TaskBoardResult<ReferenceEntry> {
        let context = OpContext::new("save_reference");
        self.references
            .save_entry(kind, draft)
            .await
            .map_err(|err| context.reference(err))
    }

    async fn list_reference(&self, kind: ReferenceKind) -> TaskBoardResult<Vec<ReferenceEntry>> {
        let context = OpContext::new("list_reference");
        self.references
            .entries(kind)
            .await
            .map_err(|err| context.reference(err))
    }

    async fn require_task(&self, task_id: TaskId, context: OpContext) -> TaskBoardResult<Task> {
        self.store
            .find_by_id(task_id)
            .await
            .map_err(|err| context.store(err))?
            .ok_or(TaskBoardError::NotFound(task_id))
    }

    async fn details(&self, task: Task, context: OpContext) -> TaskBoardResult<TaskDetails> {
        let status = self
            .references
            .find_by_id(ReferenceKind::Status, task.status_id().value())
            .await
            .map_err(|err| context.reference(err))?;
        let priority = self
            .references
            .find_by_id(ReferenceKind::Priority, task.priority_id().value())
            .await
            .map_err(|err| context.reference(err))?;
        let task_type = self
            .references
            .find_by_id(ReferenceKind::Type, task.type_id().value())
            .await
            .map_err(|err| context.reference(err))?;
        Ok(TaskDetails {
            task,
            status,
            priority,
            task_type,
        })
    }
}

fn normalized(mut content: TaskContent) -> TaskContent {
    content.normalize_criteria_order();
    content
}
