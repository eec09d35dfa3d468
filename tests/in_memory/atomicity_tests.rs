//! Failed transactions leave no partial writes behind.

use super::helpers::{Board, board, column, slot};
use rstest::rstest;
use taskboard::{
    board::{
        adapters::memory::InMemoryBoardStore,
        domain::StatusId,
        services::{ErrorKind, MoveTaskRequest, TaskBoardError, ValidationError},
    },
    config::EngineConfig,
};

fn expired_budget() -> EngineConfig {
    EngineConfig {
        transaction_timeout_ms: 0,
        ..EngineConfig::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_commit_keeps_both_columns_untouched(board: Board) -> Result<(), eyre::Report> {
    let todo = board.status("todo").await?;
    let done = board.status("done").await?;
    let ids = board.populate(todo, &["A", "B"]).await?;
    board.populate(done, &["Z"]).await?;
    let a_id = *ids.first().ok_or_else(|| eyre::eyre!("missing task A"))?;

    board.store.fail_next_commit();
    let err = board
        .service
        .move_task(MoveTaskRequest::new(a_id, done, slot(0)))
        .await
        .expect_err("commit should fail");

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(board.titles(column(todo)).await?, vec!["A", "B"]);
    assert_eq!(board.titles(column(done)).await?, vec!["Z"]);
    assert!(board.audit.status_history(a_id).is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exceeded_deadline_aborts_the_move() -> Result<(), eyre::Report> {
    let seeded = Board::around(InMemoryBoardStore::with_defaults());
    let todo = seeded.status("todo").await?;
    let ids = seeded.populate(todo, &["A", "B", "C"]).await?;
    let c_id = *ids.last().ok_or_else(|| eyre::eyre!("missing task C"))?;
    let expired = seeded.service.with_config(expired_budget());

    let err = expired
        .move_task(MoveTaskRequest::new(c_id, todo, slot(0)))
        .await
        .expect_err("deadline should be exceeded");

    assert!(matches!(
        err,
        TaskBoardError::Internal {
            operation: "move_task",
            ..
        }
    ));
    let titles: Vec<String> = expired
        .list_partition(column(todo))
        .await?
        .iter()
        .map(|task| task.title().as_str().to_owned())
        .collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_reports_missing_task(board: Board) -> Result<(), eyre::Report> {
    let todo = board.status("todo").await?;
    let ids = board.populate(todo, &["Only"]).await?;
    let task_id = *ids.first().ok_or_else(|| eyre::eyre!("missing task"))?;
    board.service.delete_task(task_id, None).await?;

    let err = board
        .service
        .delete_task(task_id, None)
        .await
        .expect_err("second delete should fail");

    assert!(matches!(err, TaskBoardError::NotFound(id) if id == task_id));
    assert!(board.store.positions(column(todo))?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_target_status_leaves_both_columns_untouched(
    board: Board,
) -> Result<(), eyre::Report> {
    let todo = board.status("todo").await?;
    let done = board.status("done").await?;
    let ids = board.populate(todo, &["A", "B", "C"]).await?;
    board.populate(done, &["X", "Y"]).await?;
    let b_id = *ids.get(1).ok_or_else(|| eyre::eyre!("missing task B"))?;
    let missing = StatusId::new(9_999)?;
    let todo_before = board.store.positions(column(todo))?;
    let done_before = board.store.positions(column(done))?;

    let err = board
        .service
        .move_task(MoveTaskRequest::new(b_id, missing, slot(0)))
        .await
        .expect_err("unknown status should be rejected");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err,
        TaskBoardError::Validation(ValidationError::UnknownStatus(id)) if id == missing
    ));
    assert_eq!(board.store.positions(column(todo))?, todo_before);
    assert_eq!(board.store.positions(column(done))?, done_before);
    assert_eq!(board.titles(column(todo)).await?, vec!["A", "B", "C"]);
    assert_eq!(board.titles(column(done)).await?, vec!["X", "Y"]);
    assert_eq!(board.service.get_task(b_id).await?.task.status_id(), todo);
    Ok(())
}
