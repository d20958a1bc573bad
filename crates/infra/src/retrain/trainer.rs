//! The external training process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrainerError {
    #[error("training script not found: {0}")]
    ScriptMissing(PathBuf),

    #[error("failed to start training process: {0}")]
    Spawn(String),

    #[error("training process io failed: {0}")]
    Io(String),
}

/// Captured result of one training run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingRun {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TrainingRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs training to completion.
#[async_trait]
pub trait Trainer: Send + Sync + 'static {
    /// Cheap readiness check made before a run is admitted.
    fn preflight(&self) -> Result<(), TrainerError>;

    async fn run(&self) -> Result<TrainingRun, TrainerError>;
}

/// `<python> <script>` in the server's working directory and environment.
#[derive(Debug, Clone)]
pub struct ScriptTrainer {
    python: PathBuf,
    script: PathBuf,
}

impl ScriptTrainer {
    pub fn new(python: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl Trainer for ScriptTrainer {
    fn preflight(&self) -> Result<(), TrainerError> {
        if self.script.is_file() {
            Ok(())
        } else {
            Err(TrainerError::ScriptMissing(self.script.clone()))
        }
    }

    async fn run(&self) -> Result<TrainingRun, TrainerError> {
        info!(
            python = %self.python.display(),
            script = %self.script.display(),
            "starting training process"
        );

        let mut child = Command::new(&self.python)
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrainerError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .map(|out| relay(out, "stdout"))
            .ok_or_else(|| TrainerError::Io("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .map(|err| relay(err, "stderr"))
            .ok_or_else(|| TrainerError::Io("stderr not captured".to_string()))?;

        let status = child
            .wait()
            .await
            .map_err(|e| TrainerError::Io(e.to_string()))?;

        let join = |e: tokio::task::JoinError| TrainerError::Io(e.to_string());
        Ok(TrainingRun {
            exit_code: status.code(),
            stdout: stdout.await.map_err(join)?,
            stderr: stderr.await.map_err(join)?,
        })
    }
}

/// Forward each line to the log as it arrives and collect the whole stream.
fn relay<R>(reader: R, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut collected = String::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if stream == "stderr" {
                        warn!(stream, "{line}");
                    } else {
                        info!(stream, "{line}");
                    }
                    collected.push_str(&line);
                    collected.push('\n');
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(stream, error = %e, "stopped reading training output");
                    break;
                }
            }
        }
        collected
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn script(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plantcare-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("train.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn preflight_reports_missing_script() {
        let trainer = ScriptTrainer::new("sh", "/definitely/not/here.py");
        assert_eq!(
            trainer.preflight(),
            Err(TrainerError::ScriptMissing(PathBuf::from("/definitely/not/here.py")))
        );
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let path = script("echo 'Accuracy: 0.91'\necho 'oops' >&2\nexit 3\n");
        let trainer = ScriptTrainer::new("sh", &path);
        trainer.preflight().unwrap();

        let run = trainer.run().await.unwrap();
        assert_eq!(run.exit_code, Some(3));
        assert!(!run.succeeded());
        assert_eq!(run.stdout, "Accuracy: 0.91\n");
        assert_eq!(run.stderr, "oops\n");
    }

    #[tokio::test]
    async fn unknown_interpreter_is_a_spawn_error() {
        let path = script("exit 0\n");
        let trainer = ScriptTrainer::new("/no/such/interpreter", &path);
        assert!(matches!(trainer.run().await, Err(TrainerError::Spawn(_))));
    }
}
