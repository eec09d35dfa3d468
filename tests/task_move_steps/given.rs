//! Given steps for task move BDD scenarios.

use super::world::{TaskMoveWorld, run_async, titles};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use taskboard::board::services::CreateTaskRequest;

#[given(r#"tasks "{list}" in column "{code}""#)]
fn tasks_in_column(
    world: &mut TaskMoveWorld,
    list: String,
    code: String,
) -> Result<(), eyre::Report> {
    let partition = world.column(&code)?;
    for title in titles(&list) {
        let request = CreateTaskRequest::new(title.clone()).with_status(partition.status_id);
        let created = run_async(world.service.create_task(request))
            .wrap_err_with(|| format!("create task {title}"))?;
        world.tasks.insert(title, created.task.id());
    }
    Ok(())
}

#[given(r#"task "{dependent}" depends on task "{dependency}""#)]
fn task_depends_on(
    world: &mut TaskMoveWorld,
    dependent: String,
    dependency: String,
) -> Result<(), eyre::Report> {
    let dependent_id = world.task(&dependent)?;
    let dependency_id = world.task(&dependency)?;
    run_async(world.service.add_dependency(dependent_id, dependency_id))
        .wrap_err("record dependency edge")?;
    Ok(())
}
