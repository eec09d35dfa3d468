//! `PostgreSQL` task and reference store.
//!
//! Mutations run in `SERIALIZABLE` transactions bounded by `SET LOCAL`
//! statement and lock timeouts. Neighbour shifts are single range updates;
//! the `(board_id, status_id, order_index)` uniqueness constraint is deferred
//! to commit so intermediate duplicates inside a transaction are legal.

use super::{
    models::{NewTaskRow, PresenceRow, ReferenceRow, TaskDetailsChangeset, TaskRow},
    pool::{BoardPgPool, run_blocking},
    schema::{task_dependencies, tasks},
};
use crate::board::{
    domain::{
        ActorId, BoardId, DependencyEdge, OrderIndex, OrderingError, Partition, PersistedTaskData,
        PriorityId, RangeShift, ReferenceDraft, ReferenceEntry, ReferenceKind, StatusId, Task,
        TaskContent, TaskEdit, TaskId, TaskTitle, TypeId,
        ordering::{plan_append, plan_move, plan_removal},
    },
    ports::{
        MoveCommand, MoveOutcome, ReferenceStore, ReferenceStoreError, ReferenceStoreResult,
        TaskStore, TaskStoreError, TaskStoreResult, TransactionBudget,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Int4, Nullable, Text, Uuid as SqlUuid, Varchar};
use std::time::Duration;
use tracing::debug;

const SHIFT_SQL: &str = concat!(
    "UPDATE tasks SET order_index = order_index + $1 ",
    "WHERE board_id IS NOT DISTINCT FROM $2 AND status_id = $3 ",
    "AND order_index >= $4 ",
    "AND ($5::INT4 IS NULL OR order_index <= $5) ",
    "AND ($6::UUID IS NULL OR id <> $6)",
);

const CYCLE_SQL: &str = concat!(
    "WITH RECURSIVE reachable(task_id) AS (",
    "SELECT dependency_task_id FROM task_dependencies WHERE dependent_task_id = $1 ",
    "UNION ",
    "SELECT d.dependency_task_id FROM task_dependencies d ",
    "JOIN reachable r ON d.dependent_task_id = r.task_id",
    ") SELECT EXISTS(SELECT 1 FROM reachable WHERE task_id = $2) AS present",
);

const TASKS_PRIMARY_KEY: &str = "tasks_pkey";

/// `PostgreSQL`-backed task and reference store.
#[derive(Debug, Clone)]
pub struct PostgresBoardStore {
    pool: BoardPgPool,
    transaction_limit: Duration,
    lock_timeout: Duration,
}

impl PostgresBoardStore {
    /// Creates a store from a connection pool with five-second transactions
    /// and two-second lock waits for operations that carry no budget.
    #[must_use]
    pub const fn new(pool: BoardPgPool) -> Self {
        Self {
            pool,
            transaction_limit: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(2),
        }
    }

    /// Overrides the limits used by operations that carry no budget.
    #[must_use]
    pub const fn with_timeouts(
        mut self,
        transaction_limit: Duration,
        lock_timeout: Duration,
    ) -> Self {
        self.transaction_limit = transaction_limit;
        self.lock_timeout = lock_timeout;
        self
    }

    /// Returns the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &BoardPgPool {
        &self.pool
    }

    fn budget(&self) -> TransactionBudget {
        TransactionBudget::start(self.transaction_limit, self.lock_timeout)
    }
}

/// Failure inside a transaction body, classified once the transaction ends.
enum TxError {
    Store(TaskStoreError),
    Database(DieselError),
}

impl From<DieselError> for TxError {
    fn from(value: DieselError) -> Self {
        Self::Database(value)
    }
}

impl From<TaskStoreError> for TxError {
    fn from(value: TaskStoreError) -> Self {
        Self::Store(value)
    }
}

impl From<OrderingError> for TxError {
    fn from(value: OrderingError) -> Self {
        Self::Store(value.into())
    }
}

type TxResult<T> = Result<T, TxError>;

fn classify(err: DieselError, limit: Duration) -> TaskStoreError {
    match &err {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            TaskStoreError::SerializationConflict
        }
        DieselError::DatabaseError(_, info) if info.message().contains("deadlock detected") => {
            TaskStoreError::SerializationConflict
        }
        DieselError::DatabaseError(_, info) if is_timeout(info.message()) => {
            TaskStoreError::DeadlineExceeded { limit }
        }
        _ => TaskStoreError::persistence(err),
    }
}

fn is_timeout(message: &str) -> bool {
    message.contains("statement timeout") || message.contains("lock timeout")
}

/// Runs `operation` in a serializable transaction bounded by `budget`.
fn serializable<T>(
    connection: &mut PgConnection,
    budget: TransactionBudget,
    operation: impl FnOnce(&mut PgConnection) -> TxResult<T>,
) -> TaskStoreResult<T> {
    connection
        .build_transaction()
        .serializable()
        .run(|tx| {
            apply_timeouts(tx, &budget)?;
            let value = operation(tx)?;
            budget.ensure_remaining()?;
            Ok(value)
        })
        .map_err(|err| match err {
            TxError::Store(store_err) => store_err,
            TxError::Database(db_err) => classify(db_err, budget.limit()),
        })
}

fn apply_timeouts(connection: &mut PgConnection, budget: &TransactionBudget) -> TxResult<()> {
    let statement_ms = budget.remaining().as_millis().max(1);
    let lock_ms = budget.lock_timeout().as_millis().max(1);
    diesel::sql_query(format!("SET LOCAL statement_timeout = {statement_ms}")).execute(connection)?;
    diesel::sql_query(format!("SET LOCAL lock_timeout = {lock_ms}")).execute(connection)?;
    Ok(())
}

fn lock_task(connection: &mut PgConnection, task_id: TaskId) -> TxResult<Task> {
    let row = tasks::table
        .filter(tasks::id.eq(task_id.into_inner()))
        .select(TaskRow::as_select())
        .for_update()
        .first::<TaskRow>(connection)
        .optional()?
        .ok_or(TaskStoreError::NotFound(task_id))?;
    Ok(row_to_task(row)?)
}

fn reference_exists(connection: &mut PgConnection, kind: ReferenceKind, id: i32) -> TxResult<bool> {
    let probe = diesel::sql_query(format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1) AS present",
        kind.table_name()
    ))
    .bind::<Int4, _>(id)
    .get_result::<PresenceRow>(connection)?;
    Ok(probe.present)
}

fn ensure_status(connection: &mut PgConnection, status_id: StatusId) -> TxResult<()> {
    if reference_exists(connection, ReferenceKind::Status, status_id.value())? {
        return Ok(());
    }
    Err(TaskStoreError::UnknownStatus(status_id).into())
}

fn ensure_priority(connection: &mut PgConnection, priority_id: PriorityId) -> TxResult<()> {
    if reference_exists(connection, ReferenceKind::Priority, priority_id.value())? {
        return Ok(());
    }
    Err(TaskStoreError::UnknownPriority(priority_id).into())
}

fn ensure_type(connection: &mut PgConnection, type_id: TypeId) -> TxResult<()> {
    if reference_exists(connection, ReferenceKind::Type, type_id.value())? {
        return Ok(());
    }
    Err(TaskStoreError::UnknownType(type_id).into())
}

fn partition_len(connection: &mut PgConnection, partition: Partition) -> TxResult<u32> {
    let count = tasks::table
        .filter(tasks::board_id.is_not_distinct_from(partition.board_id.map(BoardId::into_inner)))
        .filter(tasks::status_id.eq(partition.status_id.value()))
        .count()
        .get_result::<i64>(connection)?;
    Ok(u32::try_from(count).map_err(TaskStoreError::persistence)?)
}

fn next_position(connection: &mut PgConnection, partition: Partition) -> TxResult<u32> {
    let max = tasks::table
        .filter(tasks::board_id.is_not_distinct_from(partition.board_id.map(BoardId::into_inner)))
        .filter(tasks::status_id.eq(partition.status_id.value()))
        .select(diesel::dsl::max(tasks::order_index))
        .get_result::<Option<i32>>(connection)?;
    let next = max.map_or(0, |value| i64::from(value) + 1);
    Ok(u32::try_from(next).map_err(TaskStoreError::persistence)?)
}

fn apply_shift(connection: &mut PgConnection, shift: &RangeShift) -> TxResult<()> {
    let affected = diesel::sql_query(SHIFT_SQL)
        .bind::<Int4, _>(shift.delta.offset())
        .bind::<Nullable<SqlUuid>, _>(shift.partition.board_id.map(BoardId::into_inner))
        .bind::<Int4, _>(shift.partition.status_id.value())
        .bind::<Int4, _>(shift.start.to_persisted())
        .bind::<Nullable<Int4>, _>(shift.end.map(OrderIndex::to_persisted))
        .bind::<Nullable<SqlUuid>, _>(shift.excluding.map(TaskId::into_inner))
        .execute(connection)?;
    debug!(%shift, affected, "applied range shift");
    Ok(())
}

fn count_inbound(connection: &mut PgConnection, task_id: TaskId) -> TxResult<u64> {
    let count = task_dependencies::table
        .filter(task_dependencies::dependency_task_id.eq(task_id.into_inner()))
        .count()
        .get_result::<i64>(connection)?;
    Ok(u64::try_from(count).map_err(TaskStoreError::persistence)?)
}

fn move_locked(connection: &mut PgConnection, command: &MoveCommand) -> TxResult<MoveOutcome> {
    let mut task = lock_task(connection, command.task_id)?;
    ensure_status(connection, command.target_status)?;
    ensure_type(connection, command.type_id)?;

    let target = task.partition().with_status(command.target_status);
    let plan = plan_move(
        task.id(),
        task.slot(),
        target,
        command.target_order,
        partition_len(connection, target)?,
        command.policy,
    )?;
    for shift in &plan.shifts {
        apply_shift(connection, shift)?;
    }

    task.relocate(plan.destination, command.type_id, command.moved_at);
    let updated = diesel::update(tasks::table.filter(tasks::id.eq(task.id().into_inner())))
        .set((
            tasks::status_id.eq(task.status_id().value()),
            tasks::order_index.eq(task.order_index().to_persisted()),
            tasks::type_id.eq(task.type_id().value()),
            tasks::updated_at.eq(task.updated_at()),
        ))
        .execute(connection)?;
    if updated == 0 {
        return Err(TaskStoreError::NotFound(task.id()).into());
    }
    Ok(MoveOutcome { task, plan })
}

fn append_task(connection: &mut PgConnection, candidate: Task) -> TxResult<Task> {
    ensure_status(connection, candidate.status_id())?;
    ensure_priority(connection, candidate.priority_id())?;
    ensure_type(connection, candidate.type_id())?;

    let partition = candidate.partition();
    let tail = plan_append(partition, next_position(connection, partition)?)?;
    let placed = candidate.placed_at(tail);
    let row = to_new_row(&placed)?;
    diesel::insert_into(tasks::table)
        .values(&row)
        .execute(connection)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                if info.constraint_name() == Some(TASKS_PRIMARY_KEY) =>
            {
                TxError::Store(TaskStoreError::DuplicateTask(placed.id()))
            }
            other => TxError::Database(other),
        })?;
    Ok(placed)
}

fn delete_locked(connection: &mut PgConnection, task_id: TaskId) -> TxResult<Task> {
    let task = lock_task(connection, task_id)?;
    let dependent_count = count_inbound(connection, task_id)?;
    if dependent_count > 0 {
        return Err(TaskStoreError::DependentsExist {
            task_id,
            dependent_count,
        }
        .into());
    }

    let id = task_id.into_inner();
    diesel::delete(task_dependencies::table.filter(task_dependencies::dependent_task_id.eq(id)))
        .execute(connection)?;
    diesel::delete(tasks::table.filter(tasks::id.eq(id))).execute(connection)?;
    apply_shift(
        connection,
        &plan_removal(task.partition(), task.order_index(), task_id),
    )?;
    Ok(task)
}

fn add_edge(connection: &mut PgConnection, edge: DependencyEdge) -> TxResult<()> {
    for end in [edge.dependent(), edge.dependency()] {
        let found = tasks::table
            .filter(tasks::id.eq(end.into_inner()))
            .count()
            .get_result::<i64>(connection)?;
        if found == 0 {
            return Err(TaskStoreError::NotFound(end).into());
        }
    }

    let key = (edge.dependent().into_inner(), edge.dependency().into_inner());
    let existing = task_dependencies::table
        .find(key)
        .count()
        .get_result::<i64>(connection)?;
    if existing > 0 {
        return Ok(());
    }

    let cyclic = diesel::sql_query(CYCLE_SQL)
        .bind::<SqlUuid, _>(edge.dependency().into_inner())
        .bind::<SqlUuid, _>(edge.dependent().into_inner())
        .get_result::<PresenceRow>(connection)?;
    if cyclic.present {
        return Err(TaskStoreError::DependencyCycle(edge).into());
    }

    diesel::insert_into(task_dependencies::table)
        .values((
            task_dependencies::dependent_task_id.eq(key.0),
            task_dependencies::dependency_task_id.eq(key.1),
        ))
        .on_conflict_do_nothing()
        .execute(connection)?;
    Ok(())
}

#[async_trait]
impl TaskStore for PostgresBoardStore {
    async fn append(&self, task: &Task, budget: TransactionBudget) -> TaskStoreResult<Task> {
        let candidate = task.clone();
        run_blocking(&self.pool, move |connection| {
            serializable(connection, budget, move |tx| append_task(tx, candidate))
        })
        .await
    }

    async fn move_task(&self, command: MoveCommand) -> TaskStoreResult<MoveOutcome> {
        run_blocking(&self.pool, move |connection| {
            serializable(connection, command.budget, |tx| move_locked(tx, &command))
        })
        .await
    }

    async fn update(&self, task_id: TaskId, edit: &TaskEdit) -> TaskStoreResult<Task> {
        let pending = edit.clone();
        let budget = self.budget();
        run_blocking(&self.pool, move |connection| {
            serializable(connection, budget, move |tx| {
                let mut task = lock_task(tx, task_id)?;
                if let Some(priority_id) = pending.priority_id {
                    ensure_priority(tx, priority_id)?;
                }
                if let Some(type_id) = pending.type_id {
                    ensure_type(tx, type_id)?;
                }
                task.apply_edit(pending);
                let changes = TaskDetailsChangeset {
                    title: task.title().as_str().to_owned(),
                    description: task.description().to_owned(),
                    priority_id: task.priority_id().value(),
                    type_id: task.type_id().value(),
                    content: serde_json::to_value(task.content())
                        .map_err(TaskStoreError::persistence)?,
                    updated_at: task.updated_at(),
                };
                diesel::update(tasks::table.filter(tasks::id.eq(task_id.into_inner())))
                    .set(&changes)
                    .execute(tx)?;
                Ok(task)
            })
        })
        .await
    }

    async fn delete(&self, task_id: TaskId, budget: TransactionBudget) -> TaskStoreResult<Task> {
        run_blocking(&self.pool, move |connection| {
            serializable(connection, budget, |tx| delete_locked(tx, task_id))
        })
        .await
    }

    async fn find_by_id(&self, task_id: TaskId) -> TaskStoreResult<Option<Task>> {
        run_blocking(&self.pool, move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(task_id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskStoreError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list_partition(&self, partition: Partition) -> TaskStoreResult<Vec<Task>> {
        run_blocking(&self.pool, move |connection| {
            let rows = tasks::table
                .filter(
                    tasks::board_id
                        .is_not_distinct_from(partition.board_id.map(BoardId::into_inner)),
                )
                .filter(tasks::status_id.eq(partition.status_id.value()))
                .order_by(tasks::order_index.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskStoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn count_dependents(&self, task_id: TaskId) -> TaskStoreResult<u64> {
        run_blocking(&self.pool, move |connection| {
            count_inbound(connection, task_id).map_err(|err| match err {
                TxError::Store(store_err) => store_err,
                TxError::Database(db_err) => TaskStoreError::persistence(db_err),
            })
        })
        .await
    }

    async fn add_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<()> {
        let budget = self.budget();
        run_blocking(&self.pool, move |connection| {
            serializable(connection, budget, |tx| add_edge(tx, edge))
        })
        .await
    }

    async fn remove_dependency(&self, edge: DependencyEdge) -> TaskStoreResult<bool> {
        run_blocking(&self.pool, move |connection| {
            let removed = diesel::delete(
                task_dependencies::table
                    .find((edge.dependent().into_inner(), edge.dependency().into_inner())),
            )
            .execute(connection)
            .map_err(TaskStoreError::persistence)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn dependencies_of(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskId>> {
        run_blocking(&self.pool, move |connection| {
            let ids = task_dependencies::table
                .filter(task_dependencies::dependent_task_id.eq(task_id.into_inner()))
                .order_by(task_dependencies::dependency_task_id.asc())
                .select(task_dependencies::dependency_task_id)
                .load::<uuid::Uuid>(connection)
                .map_err(TaskStoreError::persistence)?;
            Ok(ids.into_iter().map(TaskId::from_uuid).collect())
        })
        .await
    }
}

#[async_trait]
impl ReferenceStore for PostgresBoardStore {
    async fn list_entries(&self, kind: ReferenceKind) -> ReferenceStoreResult<Vec<ReferenceEntry>> {
        run_blocking(&self.pool, move |connection| {
            let rows = diesel::sql_query(format!(
                "SELECT id, code, name, description, display_order FROM {} \
                 ORDER BY display_order, id",
                kind.table_name()
            ))
            .load::<ReferenceRow>(connection)
            .map_err(ReferenceStoreError::persistence)?;
            Ok(rows.into_iter().map(row_to_entry).collect())
        })
        .await
    }

    async fn seed_defaults(&self, kind: ReferenceKind) -> ReferenceStoreResult<usize> {
        run_blocking(&self.pool, move |connection| {
            let statement = format!(
                "INSERT INTO {} (code, name, description, display_order) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (code) DO NOTHING",
                kind.table_name()
            );
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    let mut inserted = 0;
                    for seed in kind.defaults() {
                        inserted += diesel::sql_query(statement.as_str())
                            .bind::<Varchar, _>(seed.code)
                            .bind::<Varchar, _>(seed.name)
                            .bind::<Nullable<Text>, _>(Some(seed.description))
                            .bind::<Int4, _>(seed.display_order)
                            .execute(tx)?;
                    }
                    Ok(inserted)
                })
                .map_err(ReferenceStoreError::persistence)
        })
        .await
    }

    async fn save_entry(
        &self,
        kind: ReferenceKind,
        draft: &ReferenceDraft,
    ) -> ReferenceStoreResult<ReferenceEntry> {
        let code = draft.code().to_owned();
        let name = draft.name().to_owned();
        let description = draft.description().map(str::to_owned);
        let display_order = draft.display_order();
        run_blocking(&self.pool, move |connection| {
            let row = diesel::sql_query(format!(
                "INSERT INTO {} (code, name, description, display_order) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, \
                 description = EXCLUDED.description, display_order = EXCLUDED.display_order \
                 RETURNING id, code, name, description, display_order",
                kind.table_name()
            ))
            .bind::<Varchar, _>(code)
            .bind::<Varchar, _>(name)
            .bind::<Nullable<Text>, _>(description)
            .bind::<Int4, _>(display_order)
            .get_result::<ReferenceRow>(connection)
            .map_err(ReferenceStoreError::persistence)?;
            Ok(row_to_entry(row))
        })
        .await
    }
}

fn row_to_entry(row: ReferenceRow) -> ReferenceEntry {
    ReferenceEntry {
        id: row.id,
        code: row.code,
        name: row.name,
        description: row.description,
        display_order: row.display_order,
    }
}

fn to_new_row(task: &Task) -> TaskStoreResult<NewTaskRow> {
    let content = serde_json::to_value(task.content()).map_err(TaskStoreError::persistence)?;
    Ok(NewTaskRow {
        id: task.id().into_inner(),
        title: task.title().as_str().to_owned(),
        description: task.description().to_owned(),
        status_id: task.status_id().value(),
        priority_id: task.priority_id().value(),
        type_id: task.type_id().value(),
        board_id: task.board_id().map(BoardId::into_inner),
        owner_id: task.owner_id().map(ActorId::into_inner),
        order_index: task.order_index().to_persisted(),
        content,
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: TaskRow) -> TaskStoreResult<Task> {
    let TaskRow {
        id,
        title,
        description,
        status_id,
        priority_id,
        type_id,
        board_id,
        owner_id,
        order_index,
        content: persisted_content,
        created_at,
        updated_at,
    } = row;

    let content = serde_json::from_value::<TaskContent>(persisted_content)
        .map_err(TaskStoreError::persistence)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        title: TaskTitle::new(title).map_err(TaskStoreError::persistence)?,
        description,
        status_id: StatusId::new(status_id).map_err(TaskStoreError::persistence)?,
        priority_id: PriorityId::new(priority_id).map_err(TaskStoreError::persistence)?,
        type_id: TypeId::new(type_id).map_err(TaskStoreError::persistence)?,
        board_id: board_id.map(BoardId::from_uuid),
        owner_id: owner_id.map(ActorId::from_uuid),
        order_index: OrderIndex::from_persisted(order_index).map_err(TaskStoreError::persistence)?,
        content,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}
