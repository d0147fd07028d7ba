//! Local command execution

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use fleet_bench_core::{CommandOutput, RemoteCommand, RemoteError, RemoteExecutor, Session};
use tokio::process::Command;

/// Environment variable carrying the session's host name
pub const HOST_ENV: &str = "FLEET_BENCH_HOST";

/// Runs commands as local child processes
///
/// The child runs in the session's working directory, with `HOST_ENV` set to
/// the session's host name.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    timeout: Option<Duration>,
}

impl LocalExecutor {
    /// Create an executor without a time limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(
        &self,
        session: &dyn Session,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd.env(HOST_ENV, session.host());
        if let Some(dir) = session.working_dir() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(host = session.host(), %command, ?limit, "Command timed out");
                    return Err(RemoteError::Timeout(limit));
                }
            },
            None => cmd.output().await,
        };

        let output = result.map_err(|source| RemoteError::Spawn {
            command: command.to_string(),
            source,
        })?;

        // Killed by a signal
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(CommandOutput::new(
            exit_code,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}
