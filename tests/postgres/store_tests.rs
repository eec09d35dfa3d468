//! Move, delete and seeding behaviour against a real `PostgreSQL` server.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{
    PgBoard, PostgresCluster, pg_board, postgres_cluster, report, test_runtime,
};
use diesel::prelude::*;
use mockable::DefaultClock;
use rstest::rstest;
use taskboard::board::{
    domain::{OrderIndex, ReferenceKind, StatusId, TaskEdit, TaskTitle},
    ports::{ReferenceStore, TaskStore},
    services::{ErrorKind, MoveTaskRequest, TaskBoardError},
};

#[derive(diesel::QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

fn slot(value: u32) -> Result<OrderIndex, eyre::Report> {
    Ok(OrderIndex::new(value)?)
}

async fn history_rows(board: &PgBoard) -> Result<i64, eyre::Report> {
    let pool = board.pool.clone();
    let rows = tokio::task::spawn_blocking(move || -> Result<i64, eyre::Report> {
        let mut connection = pool.get()?;
        let row: CountRow = diesel::sql_query("SELECT COUNT(*) AS count FROM status_history")
            .get_result(&mut connection)?;
        Ok(row.count)
    })
    .await??;
    Ok(rows)
}

#[rstest]
fn reorder_within_a_column_commits_densely(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let ids = board.populate(todo, &["A", "B", "C"]).await?;
        let c_id = *ids.last().ok_or_else(|| eyre::eyre!("missing task C"))?;

        board
            .service
            .move_task(MoveTaskRequest::new(c_id, todo.status_id, slot(0)?))
            .await?;

        assert_eq!(board.titles(todo).await?, vec!["C", "A", "B"]);
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn cross_column_move_writes_history(postgres_cluster: PostgresCluster) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let doing = board.column("in_progress").await?;
        let ids = board.populate(todo, &["A", "B", "C"]).await?;
        board.populate(doing, &["D"]).await?;
        let a_id = *ids.first().ok_or_else(|| eyre::eyre!("missing task A"))?;

        board
            .service
            .move_task(
                MoveTaskRequest::new(a_id, doing.status_id, slot(0)?).from_status(todo.status_id),
            )
            .await?;

        assert_eq!(board.titles(todo).await?, vec!["B", "C"]);
        assert_eq!(board.titles(doing).await?, vec!["A", "D"]);
        let mut recorded = 0;
        for _ in 0..100 {
            recorded = history_rows(&board).await?;
            if recorded > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(recorded, 1);

        let history = board.service.status_history(a_id).await?;
        let record = history.first().ok_or_else(|| eyre::eyre!("missing history"))?;
        assert_eq!(history.len(), 1);
        assert_eq!(record.change.from_status, todo.status_id);
        assert_eq!(record.change.to_status, doing.status_id);
        assert_eq!(record.change.from_order.value(), 0);
        assert_eq!(record.change.to_order.value(), 0);
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn rejected_move_leaves_rows_unchanged(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let ids = board.populate(todo, &["A", "B"]).await?;
        let a_id = *ids.first().ok_or_else(|| eyre::eyre!("missing task A"))?;
        let unknown = StatusId::new(9_999)?;

        let err = board
            .service
            .move_task(MoveTaskRequest::new(a_id, unknown, slot(0)?))
            .await
            .expect_err("unknown status should be rejected");

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(board.titles(todo).await?, vec!["A", "B"]);
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn delete_closes_the_gap_and_respects_dependents(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let ids = board.populate(todo, &["A", "B", "C"]).await?;
        let (a_id, b_id, c_id) = match ids.as_slice() {
            [a, b, c] => (*a, *b, *c),
            _ => eyre::bail!("expected three tasks"),
        };
        board.service.add_dependency(c_id, a_id).await?;

        let refused = board
            .service
            .delete_task(a_id, None)
            .await
            .expect_err("A has a dependent");
        board.service.delete_task(b_id, None).await?;

        assert!(matches!(
            refused,
            TaskBoardError::DependentsExist {
                dependent_count: 1,
                ..
            }
        ));
        let positions: Vec<u32> = board
            .service
            .list_partition(todo)
            .await?
            .iter()
            .map(|task| task.order_index().value())
            .collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(board.titles(todo).await?, vec!["A", "C"]);
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn concurrent_moves_serialize_without_gaps(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let done = board.column("done").await?;
        let ids = board.populate(todo, &["A", "B", "C", "D"]).await?;
        let shared = Arc::new(board);

        let mut handles = Vec::new();
        for task_id in ids {
            let worker = Arc::clone(&shared);
            let target = slot(0)?;
            handles.push(tokio::spawn(async move {
                worker
                    .service
                    .move_task(MoveTaskRequest::new(task_id, done.status_id, target))
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let positions: Vec<u32> = shared
            .service
            .list_partition(done)
            .await?
            .iter()
            .map(|task| task.order_index().value())
            .collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert!(shared.titles(todo).await?.is_empty());
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn title_edit_committed_after_move_keeps_moved_type(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let todo = board.column("todo").await?;
        let done = board.column("done").await?;
        let ids = board.populate(todo, &["A"]).await?;
        let task_id = *ids.first().ok_or_else(|| eyre::eyre!("missing task A"))?;
        let mut pending = TaskEdit::new(&DefaultClock);
        pending.title = Some(TaskTitle::new("A, renamed")?);

        let moved = board
            .service
            .move_task(MoveTaskRequest::new(task_id, done.status_id, slot(0)?).with_type("bug"))
            .await?;
        let stored = board.store.update(task_id, &pending).await?;

        assert_eq!(stored.title().as_str(), "A, renamed");
        assert_eq!(stored.type_id(), moved.task.type_id());
        assert_eq!(stored.partition(), done);
        let reread = board.service.get_task(task_id).await?;
        assert_eq!(reread.task_type.map(|entry| entry.code), Some("bug".to_owned()));
        Ok::<(), eyre::Report>(())
    })
}

#[rstest]
fn racing_seeders_insert_each_default_once(
    postgres_cluster: PostgresCluster,
) -> Result<(), eyre::Report> {
    test_runtime().map_err(report)?.block_on(async {
        let board = pg_board(postgres_cluster).await?;
        let store = Arc::clone(&board.store);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let seeder = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                seeder.seed_defaults(ReferenceKind::Type).await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        assert_eq!(store.list_entries(ReferenceKind::Type).await?.len(), 4);
        Ok::<(), eyre::Report>(())
    })
}
