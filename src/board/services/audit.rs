//! Best-effort recording of lifecycle events.

use crate::board::{
    domain::{AuditEntry, TaskEvent},
    ports::AuditSink,
};
use mockable::Clock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Hands audit entries to an [`AuditSink`] on a background task.
///
/// Emitting never blocks the caller and sink failures are only logged.
pub struct AuditEmitter<A>
where
    A: AuditSink + 'static,
{
    sink: Arc<A>,
}

impl<A> Clone for AuditEmitter<A>
where
    A: AuditSink + 'static,
{
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<A> AuditEmitter<A>
where
    A: AuditSink + 'static,
{
    /// Creates an emitter writing to `sink`.
    #[must_use]
    pub const fn new(sink: Arc<A>) -> Self {
        Self { sink }
    }

    /// Returns the sink entries are written to.
    #[must_use]
    pub const fn sink(&self) -> &Arc<A> {
        &self.sink
    }

    /// Stamps `event` and records it on a detached background task.
    pub fn emit(&self, event: TaskEvent, clock: &impl Clock) {
        drop(self.spawn_record(AuditEntry::new(event, clock)));
    }

    /// Records `entry` on a background task and returns its handle.
    #[must_use]
    pub fn spawn_record(&self, entry: AuditEntry) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match sink.record(&entry).await {
                Ok(()) => debug!(
                    action = %entry.action(),
                    task_id = %entry.event().task_id(),
                    "recorded audit entry"
                ),
                Err(err) => warn!(
                    action = %entry.action(),
                    task_id = %entry.event().task_id(),
                    error = %err,
                    "failed to record audit entry"
                ),
            }
        })
    }
}
