//! Shared fixtures for in-memory task board integration tests.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::{InMemoryAuditSink, InMemoryBoardStore},
    domain::{AuditEntry, OrderIndex, Partition, ReferenceKind, StatusId, Task, TaskId},
    services::{CreateTaskRequest, TaskBoardService},
};

/// Service type wired to the in-memory adapters.
pub type TestService = TaskBoardService<InMemoryBoardStore, InMemoryAuditSink, DefaultClock>;

/// Service together with handles on its adapters.
pub struct Board {
    pub service: TestService,
    pub store: Arc<InMemoryBoardStore>,
    pub audit: Arc<InMemoryAuditSink>,
}

impl Board {
    /// Wires a service around `store`.
    #[must_use]
    pub fn around(store: InMemoryBoardStore) -> Self {
        let store_handle = Arc::new(store);
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = TaskBoardService::new(
            Arc::clone(&store_handle),
            Arc::clone(&audit),
            Arc::new(DefaultClock),
        );
        Self {
            service,
            store: store_handle,
            audit,
        }
    }

    /// Resolves a status code to its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup fails or the code is unknown.
    pub async fn status(&self, code: &str) -> Result<StatusId, eyre::Report> {
        let entry = self
            .service
            .references()
            .find_by_code(ReferenceKind::Status, code)
            .await?
            .ok_or_else(|| eyre::eyre!("status {code} is not seeded"))?;
        Ok(StatusId::new(entry.id)?)
    }

    /// Creates one task per title in `status`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when any creation fails.
    pub async fn populate(
        &self,
        status_id: StatusId,
        titles: &[&str],
    ) -> Result<Vec<TaskId>, eyre::Report> {
        let mut ids = Vec::with_capacity(titles.len());
        for title in titles {
            let details = self
                .service
                .create_task(CreateTaskRequest::new(*title).with_status(status_id))
                .await?;
            ids.push(details.task.id());
        }
        Ok(ids)
    }

    /// Returns the task titles of a partition in position order.
    ///
    /// # Errors
    ///
    /// Returns an error when the listing fails.
    pub async fn titles(&self, partition: Partition) -> Result<Vec<String>, eyre::Report> {
        let tasks = self.service.list_partition(partition).await?;
        Ok(tasks
            .iter()
            .map(|task: &Task| task.title().as_str().to_owned())
            .collect())
    }

    /// Waits for the asynchronous audit writer to record `count` entries.
    pub async fn audit_entries(&self, count: usize) -> Vec<AuditEntry> {
        for _ in 0..200 {
            let entries = self.audit.entries();
            if entries.len() >= count {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.audit.entries()
    }
}

/// Provides a board whose vocabularies hold their defaults.
#[fixture]
pub fn board() -> Board {
    Board::around(InMemoryBoardStore::with_defaults())
}

/// Unscoped partition of `status_id`.
#[must_use]
pub const fn column(status_id: StatusId) -> Partition {
    Partition::new(None, status_id)
}

/// Builds an order index from a literal.
///
/// # Panics
///
/// Panics when `value` exceeds the persisted range.
#[must_use]
pub fn slot(value: u32) -> OrderIndex {
    OrderIndex::new(value).expect("order literal should be in range")
}

/// Asserts that a partition holds exactly the positions `0..len`.
///
/// # Errors
///
/// Returns an error when the positions are not dense.
pub fn ensure_dense(board: &Board, partition: Partition) -> Result<(), eyre::Report> {
    let positions = board.store.positions(partition)?;
    let expected: Vec<u32> = (0..).take(positions.len()).collect();
    eyre::ensure!(
        positions == expected,
        "partition {partition} is not dense: {positions:?}"
    );
    Ok(())
}
