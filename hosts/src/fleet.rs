//! Local fleet: participants as concurrent tasks over local host directories

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_bench_core::{
    BenchError, BenchResult, ParticipantOutcome, ParticipantStatus, RemoteCommand,
    RemoteExecutor, RunOutcome, Session, TaskDefinition, TaskSubmitter,
};
use futures::future::join_all;
use tokio::time::Instant;

use crate::session::LocalSession;

/// Environment variable carrying the participant index
pub const PARTICIPANT_ENV: &str = "FLEET_BENCH_PARTICIPANT";

/// Launches one participant per concurrency slot of the task definition
///
/// Participant `i` runs on host `<prefix>-<i>`, whose filesystem is the
/// directory `<base_dir>/<prefix>-<i>`. Each participant runs the task's
/// script with the configured interpreter.
#[derive(Debug, Clone)]
pub struct LocalFleet {
    base_dir: PathBuf,
    interpreter: String,
    host_prefix: String,
}

impl LocalFleet {
    /// Create a fleet whose host directories live under `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, interpreter: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            interpreter: interpreter.into(),
            host_prefix: "vm".to_string(),
        }
    }

    /// Use a different host name prefix
    pub fn with_host_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.host_prefix = prefix.into();
        self
    }

    /// Directory containing the host roots
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Host name of participant `index`
    pub fn host_name(&self, index: usize) -> String {
        format!("{}-{}", self.host_prefix, index)
    }

    /// Session for participant `index`
    pub fn session(&self, index: usize) -> LocalSession {
        let host = self.host_name(index);
        let root = self.base_dir.join(&host);
        LocalSession::new(host, root)
    }
}

async fn run_participant(
    participant: usize,
    session: LocalSession,
    command: RemoteCommand,
    executor: Arc<dyn RemoteExecutor>,
) -> ParticipantOutcome {
    let start = Instant::now();
    let host = session.host().to_string();

    let status = match tokio::fs::create_dir_all(session.root()).await {
        Err(e) => ParticipantStatus::Failed {
            error: format!("creating host root {}: {e}", session.root().display()),
        },
        Ok(()) => match executor.execute(&session, &command).await {
            Ok(output) => ParticipantStatus::Completed { output },
            Err(e) => ParticipantStatus::Failed {
                error: e.to_string(),
            },
        },
    };

    if let ParticipantStatus::Failed { error } = &status {
        tracing::warn!(participant, host = %host, error = %error, "Participant failed");
    }

    ParticipantOutcome {
        participant,
        host,
        status,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

#[async_trait]
impl TaskSubmitter for LocalFleet {
    fn name(&self) -> &str {
        "local-fleet"
    }

    async fn submit(
        &self,
        task: &TaskDefinition,
        executor: Arc<dyn RemoteExecutor>,
    ) -> BenchResult<RunOutcome> {
        let participants = task.concurrency()?;
        let script = task
            .script()
            .ok_or_else(|| BenchError::task("task definition has no script"))?;

        tracing::info!(
            participants,
            script,
            base_dir = %self.base_dir.display(),
            "Launching local participants"
        );

        let handles: Vec<_> = (0..participants)
            .map(|participant| {
                let command = RemoteCommand::new(&self.interpreter)
                    .arg(script)
                    .env(PARTICIPANT_ENV, participant.to_string());
                tokio::spawn(run_participant(
                    participant,
                    self.session(participant),
                    command,
                    Arc::clone(&executor),
                ))
            })
            .collect();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(participant, joined)| {
                joined.unwrap_or_else(|e| ParticipantOutcome {
                    participant,
                    host: self.host_name(participant),
                    status: ParticipantStatus::Failed {
                        error: format!("participant task failed: {e}"),
                    },
                    elapsed_ms: 0.0,
                })
            })
            .collect();

        Ok(RunOutcome::new(outcomes))
    }
}
