//! When steps for task move BDD scenarios.

use super::world::{TaskMoveWorld, run_async};
use rstest_bdd_macros::when;
use taskboard::board::{domain::OrderIndex, services::MoveTaskRequest};

#[when(r#"task "{title}" is moved to column "{code}" at position {position:u32}"#)]
fn move_task(
    world: &mut TaskMoveWorld,
    title: String,
    code: String,
    position: u32,
) -> Result<(), eyre::Report> {
    let task_id = world.task(&title)?;
    let partition = world.column(&code)?;
    let request = MoveTaskRequest::new(task_id, partition.status_id, OrderIndex::new(position)?);
    world.last_error = run_async(world.service.move_task(request)).err();
    Ok(())
}

#[when(r#"task "{title}" is deleted"#)]
fn delete_task(world: &mut TaskMoveWorld, title: String) -> Result<(), eyre::Report> {
    let task_id = world.task(&title)?;
    world.last_error = run_async(world.service.delete_task(task_id, None)).err();
    Ok(())
}
