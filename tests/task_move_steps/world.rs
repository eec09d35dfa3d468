//! Shared world state for task move BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::{InMemoryAuditSink, InMemoryBoardStore},
    domain::{Partition, ReferenceKind, StatusId, TaskId},
    services::{TaskBoardError, TaskBoardService},
};

/// Service type used by the BDD world.
pub type TestBoardService = TaskBoardService<InMemoryBoardStore, InMemoryAuditSink, DefaultClock>;

/// Scenario world for task move behaviour tests.
pub struct TaskMoveWorld {
    pub service: TestBoardService,
    pub audit: Arc<InMemoryAuditSink>,
    pub tasks: HashMap<String, TaskId>,
    pub last_error: Option<TaskBoardError>,
}

impl TaskMoveWorld {
    /// Creates a world around a store seeded with the default vocabularies.
    #[must_use]
    pub fn new() -> Self {
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = TaskBoardService::new(
            Arc::new(InMemoryBoardStore::with_defaults()),
            Arc::clone(&audit),
            Arc::new(DefaultClock),
        );

        Self {
            service,
            audit,
            tasks: HashMap::new(),
            last_error: None,
        }
    }

    /// Looks up a task created earlier in the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no task has the title.
    pub fn task(&self, title: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(title)
            .copied()
            .ok_or_else(|| eyre::eyre!("no task titled {title} in scenario world"))
    }

    /// Resolves a status code to the unscoped partition of that column.
    ///
    /// # Errors
    ///
    /// Returns an error when the status code is unknown.
    pub fn column(&self, code: &str) -> Result<Partition, eyre::Report> {
        let entry = run_async(
            self.service
                .references()
                .find_by_code(ReferenceKind::Status, code),
        )?
        .ok_or_else(|| eyre::eyre!("unknown column {code}"))?;
        Ok(Partition::new(None, StatusId::new(entry.id)?))
    }
}

impl Default for TaskMoveWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TaskMoveWorld {
    TaskMoveWorld::default()
}

/// Splits a comma-separated list of task titles.
#[must_use]
pub fn titles(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
