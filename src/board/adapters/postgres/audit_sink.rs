//! `PostgreSQL` audit sink writing `audit_logs` and `status_history`.

use super::{
    models::{NewAuditLogRow, NewStatusHistoryRow, StatusHistoryRow},
    pool::{BoardPgPool, run_blocking},
    schema::{audit_logs, status_history},
};
use crate::board::{
    domain::{
        ActorId, AuditEntry, BoardId, OrderIndex, StatusChange, StatusHistoryRecord, StatusId,
        TaskDomainError, TaskId,
    },
    ports::{AuditSink, AuditSinkError},
};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

/// Audit sink backed by the append-only audit tables.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: BoardPgPool,
}

impl PostgresAuditSink {
    /// Creates a sink from a connection pool.
    #[must_use]
    pub const fn new(pool: BoardPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
        let details = entry
            .details()
            .map_err(|err| AuditSinkError::Encoding(err.to_string()))?;
        let event = entry.event();
        let log_row = NewAuditLogRow {
            id: entry.id(),
            action: entry.action().as_str().to_owned(),
            task_id: event.task_id().into_inner(),
            actor_id: event.actor().map(ActorId::into_inner),
            details,
            occurred_at: entry.occurred_at(),
        };
        let history_row = entry.status_change().map(|change| NewStatusHistoryRow {
            id: entry.id(),
            task_id: change.task_id.into_inner(),
            board_id: change.board_id.map(BoardId::into_inner),
            from_status_id: change.from_status.value(),
            to_status_id: change.to_status.value(),
            from_order: change.from_order.to_persisted(),
            to_order: change.to_order.to_persisted(),
            comment: change.comment.clone(),
            actor_id: change.actor.map(ActorId::into_inner),
            changed_at: entry.occurred_at(),
        });

        run_blocking(&self.pool, move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    diesel::insert_into(audit_logs::table)
                        .values(&log_row)
                        .execute(tx)?;
                    if let Some(row) = &history_row {
                        diesel::insert_into(status_history::table)
                            .values(row)
                            .execute(tx)?;
                    }
                    Ok(())
                })
                .map_err(AuditSinkError::persistence)
        })
        .await
    }

    async fn history(&self, task_id: TaskId) -> Result<Vec<StatusHistoryRecord>, AuditSinkError> {
        let rows = run_blocking(&self.pool, move |connection| {
            status_history::table
                .filter(status_history::task_id.eq(task_id.into_inner()))
                .order((status_history::changed_at.desc(), status_history::id.desc()))
                .select(StatusHistoryRow::as_select())
                .load::<StatusHistoryRow>(connection)
                .map_err(AuditSinkError::persistence)
        })
        .await?;
        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: StatusHistoryRow) -> Result<StatusHistoryRecord, AuditSinkError> {
    let id = row.id;
    let invalid = |err: TaskDomainError| AuditSinkError::InvalidRecord {
        id,
        reason: err.to_string(),
    };
    let change = StatusChange {
        task_id: TaskId::from_uuid(row.task_id),
        board_id: row.board_id.map(BoardId::from_uuid),
        from_status: StatusId::new(row.from_status_id).map_err(invalid)?,
        to_status: StatusId::new(row.to_status_id).map_err(invalid)?,
        from_order: OrderIndex::from_persisted(row.from_order).map_err(invalid)?,
        to_order: OrderIndex::from_persisted(row.to_order).map_err(invalid)?,
        comment: row.comment,
        actor: row.actor_id.map(ActorId::from_uuid),
    };
    Ok(StatusHistoryRecord {
        id,
        change,
        changed_at: row.changed_at,
    })
}
