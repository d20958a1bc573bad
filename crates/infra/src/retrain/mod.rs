//! Retraining subsystem.
//!
//! - `orchestrator`: guarded launch of training runs and their bookkeeping
//! - `ledger`: durable history of attempts
//! - `trainer`: the external training process
//! - `metrics`: evaluation metrics scraped from the trainer's output
//! - `schedule`: cron expressions for the scheduled checks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use plantcare_ai::AiError;

pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod schedule;
pub mod trainer;

pub use ledger::{LedgerError, TrainingAttempt, TrainingLedger};
pub use metrics::{TrainingMetrics, parse_metrics};
pub use orchestrator::{
    LastTraining, RejectReason, RetrainError, RetrainOrchestrator, RetrainOutcome, RetrainStats,
};
pub use schedule::{CronSchedule, ScheduleError};
pub use trainer::{ScriptTrainer, Trainer, TrainerError, TrainingRun};

/// What started a training attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// The schedule.
    #[default]
    Auto,
    /// An operator.
    Manual,
}

/// Invoked after a successful training run when auto-reload is on.
#[async_trait]
pub trait ReloadHandler: Send + Sync + 'static {
    async fn reload(&self) -> Result<(), AiError>;
}
