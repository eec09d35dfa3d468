//! Then steps for task move BDD scenarios.

use super::world::{TaskMoveWorld, run_async, titles};
use rstest_bdd_macros::then;
use taskboard::board::api::ErrorBody;

#[then(r#"column "{code}" lists "{list}""#)]
fn column_lists(world: &TaskMoveWorld, code: String, list: String) -> Result<(), eyre::Report> {
    let partition = world.column(&code)?;
    let tasks = run_async(world.service.list_partition(partition))?;
    let actual: Vec<String> = tasks
        .iter()
        .map(|task| task.title().as_str().to_owned())
        .collect();
    let expected = titles(&list);
    if actual != expected {
        return Err(eyre::eyre!(
            "expected column {code} to list {expected:?}, found {actual:?}"
        ));
    }
    Ok(())
}

#[then(r#"the move of task "{title}" is recorded in the audit trail"#)]
fn move_is_audited(world: &TaskMoveWorld, title: String) -> Result<(), eyre::Report> {
    let task_id = world.task(&title)?;
    for _ in 0..200 {
        if !world.audit.status_history(task_id).is_empty() {
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    Err(eyre::eyre!("no status change recorded for task {title}"))
}

#[then("the request fails with status {status:u16}")]
fn request_fails_with(world: &TaskMoveWorld, status: u16) -> Result<(), eyre::Report> {
    let err = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("expected the last request to fail"))?;
    let body = ErrorBody::from(err);
    if body.status_code() != status {
        return Err(eyre::eyre!(
            "expected status {status}, found {} ({})",
            body.status_code(),
            body.error
        ));
    }
    Ok(())
}
