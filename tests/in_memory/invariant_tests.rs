//! Density checks over arbitrary move and delete sequences.

use std::sync::Arc;

use super::helpers::{Board, board, column, ensure_dense, slot};
use proptest::prelude::*;
use rstest::rstest;
use taskboard::board::{
    adapters::memory::InMemoryBoardStore,
    domain::{StatusId, TaskId},
    services::MoveTaskRequest,
};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
enum Step {
    Move {
        task: usize,
        column: usize,
        order: u32,
    },
    Delete {
        task: usize,
    },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0_usize..12, 0_usize..3, 0_u32..16)
            .prop_map(|(task, column, order)| Step::Move { task, column, order }),
        1 => (0_usize..12).prop_map(|task| Step::Delete { task }),
    ]
}

fn runtime() -> Result<Runtime, eyre::Report> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

async fn seed(board: &Board) -> Result<(Vec<StatusId>, Vec<TaskId>), eyre::Report> {
    let mut columns = Vec::new();
    for code in ["backlog", "todo", "in_progress"] {
        columns.push(board.status(code).await?);
    }
    let mut tasks = Vec::new();
    for (index, status_id) in columns.iter().enumerate() {
        let titles: Vec<String> = (0..4).map(|n| format!("task {index}.{n}")).collect();
        let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        tasks.extend(board.populate(*status_id, &title_refs).await?);
    }
    Ok((columns, tasks))
}

async fn run(steps: Vec<Step>) -> Result<(), eyre::Report> {
    let board = Board::around(InMemoryBoardStore::with_defaults());
    let (columns, mut tasks) = seed(&board).await?;

    for step in steps {
        match step {
            Step::Move {
                task,
                column: target,
                order,
            } => {
                let picked = task.checked_rem(tasks.len()).and_then(|index| tasks.get(index));
                let (Some(task_id), Some(status_id)) = (picked, columns.get(target)) else {
                    continue;
                };
                board
                    .service
                    .move_task(MoveTaskRequest::new(*task_id, *status_id, slot(order)))
                    .await?;
            }
            Step::Delete { task } => {
                let Some(index) = task.checked_rem(tasks.len()) else {
                    continue;
                };
                let task_id = tasks.swap_remove(index);
                board.service.delete_task(task_id, None).await?;
            }
        }
        let mut total = 0;
        for status_id in &columns {
            ensure_dense(&board, column(*status_id))?;
            total += board.store.positions(column(*status_id))?.len();
        }
        eyre::ensure!(total == tasks.len(), "tasks were lost or duplicated");
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn partitions_stay_dense_under_arbitrary_steps(steps in prop::collection::vec(step(), 1..40)) {
        let outcome = runtime().and_then(|rt| rt.block_on(run(steps)));
        prop_assert!(outcome.is_ok(), "sequence failed: {:?}", outcome.err());
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_moves_into_one_column_stay_dense(board: Board) -> Result<(), eyre::Report> {
    let todo = board.status("todo").await?;
    let done = board.status("done").await?;
    let titles: Vec<String> = (0..8).map(|n| format!("parallel {n}")).collect();
    let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    let ids = board.populate(todo, &title_refs).await?;
    let shared = Arc::new(board);

    let mut handles = Vec::new();
    for task_id in ids {
        let worker = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            worker
                .service
                .move_task(MoveTaskRequest::new(task_id, done, slot(0)))
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    ensure_dense(&shared, column(todo))?;
    ensure_dense(&shared, column(done))?;
    assert_eq!(shared.store.positions(column(done))?.len(), 8);
    Ok(())
}
