//! Guarded launch of training runs.
//!
//! Lifecycle: `Idle -> Training -> Idle`. Admission (all guard checks plus
//! the `Idle -> Training` transition) happens in one synchronous critical
//! section, so two concurrent checks can never both launch a run.
//!
//! An admitted run executes on its own task. Dropping the caller's future
//! only stops waiting; the run still finishes, is recorded and releases the
//! training flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RetrainConfig;
use crate::storage::TrainingDataFile;

use super::ledger::{LedgerError, TrainingAttempt, TrainingLedger};
use super::metrics::parse_metrics;
use super::schedule::CronSchedule;
use super::trainer::Trainer;
use super::{ReloadHandler, Trigger};

/// Why a training run was not started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    AlreadyTraining,
    InsufficientSamples { count: usize, required: usize },
    TooSoon { hours_since_last: f64 },
    TrainerUnavailable { detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    Completed { attempt: TrainingAttempt },
    Failed { attempt: TrainingAttempt },
    Rejected(RejectReason),
}

impl RetrainOutcome {
    pub fn attempt(&self) -> Option<&TrainingAttempt> {
        match self {
            Self::Completed { attempt } | Self::Failed { attempt } => Some(attempt),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrainError {
    /// The run finished (and is in memory) but could not be written to disk.
    #[error("training attempt recorded in memory but not persisted: {source}")]
    Persist {
        outcome: Box<RetrainOutcome>,
        #[source]
        source: LedgerError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastTraining {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub accuracy: Option<f64>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainStats {
    pub enabled: bool,
    pub is_training: bool,
    pub total_trainings: usize,
    pub successful_trainings: usize,
    pub failed_trainings: usize,
    pub average_accuracy: Option<f64>,
    pub last_training: Option<LastTraining>,
    pub last_training_time: Option<DateTime<Utc>>,
    pub current_samples: usize,
    pub min_samples_required: usize,
    pub ready_for_training: bool,
    pub schedule: String,
    pub next_scheduled_check: Option<DateTime<Local>>,
}

#[derive(Debug)]
struct RetrainState {
    is_training: bool,
    last_training_time: Option<DateTime<Utc>>,
    ledger: TrainingLedger,
}

pub struct RetrainOrchestrator {
    shared: Arc<Shared>,
    schedule: Option<CronSchedule>,
    scheduled: AtomicBool,
}

/// Everything a running training task needs to outlive its caller.
struct Shared {
    config: RetrainConfig,
    samples: TrainingDataFile,
    trainer: Arc<dyn Trainer>,
    state: Mutex<RetrainState>,
    reload: RwLock<Option<Arc<dyn ReloadHandler>>>,
}

impl RetrainOrchestrator {
    /// Build with restored history; the cooldown anchor is the latest success.
    pub fn new(config: RetrainConfig, trainer: Arc<dyn Trainer>, ledger: TrainingLedger) -> Self {
        let schedule = match config.schedule.parse::<CronSchedule>() {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(schedule = %config.schedule, error = %e, "unusable retrain schedule");
                None
            }
        };
        let last_training_time = ledger.last_successful();
        if let Some(at) = last_training_time {
            info!(last_training = %at, records = ledger.len(), "restored retrain state");
        }

        Self {
            shared: Arc::new(Shared {
                samples: TrainingDataFile::new(&config.training_data_file),
                config,
                trainer,
                state: Mutex::new(RetrainState {
                    is_training: false,
                    last_training_time,
                    ledger,
                }),
                reload: RwLock::new(None),
            }),
            schedule,
            scheduled: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RetrainConfig {
        &self.shared.config
    }

    /// Parsed schedule, if the configured expression is usable.
    pub fn schedule(&self) -> Option<&CronSchedule> {
        self.schedule.as_ref()
    }

    pub fn set_reload_handler(&self, handler: Arc<dyn ReloadHandler>) {
        *self.shared.reload.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Marks whether a scheduler is driving this orchestrator (reported in stats).
    pub fn set_scheduled(&self, scheduled: bool) {
        self.scheduled.store(scheduled, Ordering::SeqCst);
    }

    pub fn is_training(&self) -> bool {
        self.shared.lock().is_training
    }

    pub fn last_training_time(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().last_training_time
    }

    /// Scheduled entry point: runs only when every guard passes.
    ///
    /// Never fails; a ledger write failure is logged.
    pub async fn check_and_retrain(&self) -> RetrainOutcome {
        info!("retrain check");
        match self.run(Trigger::Auto).await {
            Ok(outcome) => outcome,
            Err(RetrainError::Persist { outcome, .. }) => *outcome,
        }
    }

    /// Operator override: skips the sample-count and cooldown guards.
    pub async fn force_retrain(&self) -> Result<RetrainOutcome, RetrainError> {
        info!("manual retrain requested");
        self.run(Trigger::Manual).await
    }

    /// Attempts newest first, at most `limit`.
    pub fn history(&self, limit: usize) -> Vec<TrainingAttempt> {
        self.shared
            .lock()
            .ledger
            .history()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> RetrainStats {
        let config = &self.shared.config;
        let current_samples = self.shared.samples.count_samples();
        let state = self.shared.lock();
        let history = state.ledger.history();

        let successful = history.iter().filter(|a| a.success).count();
        let accuracies: Vec<f64> = history
            .iter()
            .filter(|a| a.success)
            .filter_map(|a| a.accuracy)
            .collect();
        let average_accuracy = (!accuracies.is_empty())
            .then(|| accuracies.iter().sum::<f64>() / accuracies.len() as f64);

        let next_scheduled_check = self
            .schedule
            .as_ref()
            .filter(|_| self.scheduled.load(Ordering::SeqCst))
            .and_then(|s| s.next_after(&Local::now()));

        RetrainStats {
            enabled: config.enabled,
            is_training: state.is_training,
            total_trainings: history.len(),
            successful_trainings: successful,
            failed_trainings: history.len() - successful,
            average_accuracy,
            last_training: history.last().map(|a| LastTraining {
                timestamp: a.timestamp,
                success: a.success,
                accuracy: a.accuracy,
                duration_seconds: a.duration_seconds,
            }),
            last_training_time: state.last_training_time,
            current_samples,
            min_samples_required: config.min_samples,
            ready_for_training: current_samples >= config.min_samples,
            schedule: config.schedule.clone(),
            next_scheduled_check,
        }
    }

    async fn run(&self, trigger: Trigger) -> Result<RetrainOutcome, RetrainError> {
        let samples = match self.shared.admit(trigger) {
            Ok(samples) => samples,
            Err(reason) => {
                info!(?reason, ?trigger, "retrain skipped");
                return Ok(RetrainOutcome::Rejected(reason));
            }
        };

        let started = Instant::now();
        let task = tokio::spawn(Arc::clone(&self.shared).execute(samples, trigger));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                // The guard already left `Training`; keep the attempt on record.
                error!(error = %e, "training task ended unexpectedly");
                let attempt = TrainingAttempt::failed(
                    Utc::now(),
                    round_tenths(started.elapsed().as_secs_f64()),
                    format!("training task ended unexpectedly: {e}"),
                    None,
                    samples,
                    trigger,
                );
                self.shared.conclude(RetrainOutcome::Failed { attempt })
            }
        }
    }
}

impl Shared {
    /// Guard checks and the transition to `Training`, without yielding.
    fn admit(&self, trigger: Trigger) -> Result<usize, RejectReason> {
        let mut state = self.lock();
        if state.is_training {
            return Err(RejectReason::AlreadyTraining);
        }

        let count = self.samples.count_samples();
        if trigger == Trigger::Auto {
            if count < self.config.min_samples {
                return Err(RejectReason::InsufficientSamples {
                    count,
                    required: self.config.min_samples,
                });
            }
            if let Some(last) = state.last_training_time {
                let hours_since_last =
                    (Utc::now() - last).num_milliseconds() as f64 / 3_600_000.0;
                if hours_since_last < self.config.cooldown_hours {
                    return Err(RejectReason::TooSoon {
                        hours_since_last: round_tenths(hours_since_last),
                    });
                }
            }
        }

        self.trainer
            .preflight()
            .map_err(|e| RejectReason::TrainerUnavailable { detail: e.to_string() })?;

        state.is_training = true;
        Ok(count)
    }

    /// Runs an admitted attempt to completion: train, record, reload.
    async fn execute(
        self: Arc<Self>,
        samples: usize,
        trigger: Trigger,
    ) -> Result<RetrainOutcome, RetrainError> {
        let training = TrainingGuard {
            shared: Arc::clone(&self),
            armed: true,
        };

        info!(samples, ?trigger, "retraining started");
        let started = Instant::now();
        let result = self.trainer.run().await;
        let duration_seconds = round_tenths(started.elapsed().as_secs_f64());
        let now = Utc::now();

        let attempt = match result {
            Ok(run) if run.succeeded() => {
                let metrics = parse_metrics(&run.stdout);
                info!(
                    duration_seconds,
                    accuracy = ?metrics.accuracy,
                    f1_score = ?metrics.f1_score,
                    "retraining completed"
                );
                TrainingAttempt::succeeded(now, duration_seconds, metrics, samples, trigger)
            }
            Ok(run) => {
                error!(exit_code = ?run.exit_code, duration_seconds, "retraining failed");
                let detail = if run.stderr.trim().is_empty() {
                    format!("training process exited with {:?}", run.exit_code)
                } else {
                    run.stderr
                };
                let exit_code = run.exit_code;
                TrainingAttempt::failed(now, duration_seconds, detail, exit_code, samples, trigger)
            }
            Err(e) => {
                error!(error = %e, "training process could not run");
                let detail = e.to_string();
                TrainingAttempt::failed(now, duration_seconds, detail, None, samples, trigger)
            }
        };
        let outcome = if attempt.success {
            RetrainOutcome::Completed { attempt }
        } else {
            RetrainOutcome::Failed { attempt }
        };

        training.disarm();
        let completed = matches!(outcome, RetrainOutcome::Completed { .. });
        let concluded = self.conclude(outcome);

        if completed && self.config.auto_reload {
            self.reload_model().await;
        }
        concluded
    }

    /// Records the attempt and maps a ledger failure into [`RetrainError`].
    fn conclude(&self, outcome: RetrainOutcome) -> Result<RetrainOutcome, RetrainError> {
        match self.record(&outcome) {
            Ok(()) => Ok(outcome),
            Err(source) => Err(RetrainError::Persist {
                outcome: Box::new(outcome),
                source,
            }),
        }
    }

    /// Back to `Idle`, advancing the cooldown anchor on success.
    fn record(&self, outcome: &RetrainOutcome) -> Result<(), LedgerError> {
        let mut state = self.lock();
        state.is_training = false;
        let Some(attempt) = outcome.attempt() else {
            return Ok(());
        };
        if attempt.success {
            state.last_training_time = Some(attempt.timestamp);
        }
        state.ledger.append(attempt.clone())
    }

    async fn reload_model(&self) {
        let handler = self
            .reload
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => match handler.reload().await {
                Ok(()) => info!("model reloaded after retraining"),
                Err(e) => error!(error = %e, "model reload failed after retraining"),
            },
            None => warn!("no reload handler registered; new model is used after restart"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RetrainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns to `Idle` if a run is abandoned mid-way (a panicking trainer).
struct TrainingGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl TrainingGuard {
    /// The run reached `record`, which leaves `Training` itself.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared.lock().is_training = false;
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
