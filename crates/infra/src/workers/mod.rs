//! Long-running background tasks.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub mod retrain_scheduler;
pub mod telemetry;

pub use retrain_scheduler::RetrainScheduler;
pub use telemetry::TelemetryWorker;

/// Handle to stop and join a background task.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown: oneshot::Sender<()>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown: Some(shutdown),
            join: Some(join),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(worker = self.name, error = %e, "worker ended abnormally");
            }
        }
    }
}
