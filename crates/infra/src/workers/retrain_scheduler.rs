use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::WorkerHandle;
use crate::retrain::{CronSchedule, RetrainOrchestrator, RetrainOutcome, Trainer};

/// Runs [`RetrainOrchestrator::check_and_retrain`] at each scheduled time.
#[derive(Debug)]
pub struct RetrainScheduler;

impl RetrainScheduler {
    /// Start the schedule if retraining is enabled, the trainer is usable
    /// and the schedule expression parses. Otherwise log why and return `None`.
    pub fn start(
        orchestrator: Arc<RetrainOrchestrator>,
        trainer: &dyn Trainer,
    ) -> Option<WorkerHandle> {
        let config = orchestrator.config();
        if !config.enabled {
            warn!("auto-retrain is disabled");
            return None;
        }
        if let Err(e) = trainer.preflight() {
            warn!(error = %e, "auto-retrain not started");
            return None;
        }
        let Some(schedule) = orchestrator.schedule().cloned() else {
            warn!(schedule = %config.schedule, "auto-retrain not started: unusable schedule");
            return None;
        };

        info!(
            schedule = %config.schedule,
            min_samples = config.min_samples,
            training_data = %config.training_data_file.display(),
            "auto-retrain active"
        );
        Some(Self::spawn(orchestrator, schedule))
    }

    /// Spawn unconditionally with an explicit schedule.
    pub fn spawn(orchestrator: Arc<RetrainOrchestrator>, schedule: CronSchedule) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        orchestrator.set_scheduled(true);

        let join = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let Some(next) = schedule.next_after(&now) else {
                    warn!(%schedule, "retrain schedule has no upcoming fire time");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                info!(next = %next, %schedule, "next retrain check scheduled");

                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(wait) => {
                        match orchestrator.check_and_retrain().await {
                            RetrainOutcome::Rejected(reason) => {
                                info!(?reason, "scheduled retrain skipped")
                            }
                            RetrainOutcome::Completed { attempt } => {
                                info!(accuracy = ?attempt.accuracy, "scheduled retrain completed")
                            }
                            RetrainOutcome::Failed { attempt } => {
                                warn!(exit_code = ?attempt.exit_code, "scheduled retrain failed")
                            }
                        }
                    }
                }
            }
            orchestrator.set_scheduled(false);
            info!("auto-retrain stopped");
        });

        WorkerHandle::new("retrain-scheduler", shutdown_tx, join)
    }
}
