//! Interception pipeline

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::barrier::{BarrierOutcome, StartBarrier};
use crate::command::{CommandOutput, RemoteCommand};
use crate::deadline::Deadline;
use crate::metadata::strip_metadata;
use crate::staging::{stage_over, StagingManifest};
use crate::traits::{MetadataSink, RemoteError, RemoteExecutor, Session};

/// Decorator that stages files, synchronizes start, and post-processes results
///
/// Create with [`InterceptorBuilder`](super::InterceptorBuilder).
pub struct Interceptor {
    pub(crate) inner: Arc<dyn RemoteExecutor>,
    pub(crate) manifest: Arc<StagingManifest>,
    pub(crate) sink: Arc<dyn MetadataSink>,
    pub(crate) barrier: Option<Arc<StartBarrier>>,
    pub(crate) deadline: Option<Deadline>,
}

impl Interceptor {
    /// The executor being decorated
    pub fn inner(&self) -> &Arc<dyn RemoteExecutor> {
        &self.inner
    }

    /// Arrive at the barrier, if one is configured
    ///
    /// Timing out is not an error; the caller proceeds unsynchronized.
    async fn synchronize(&self, host: &str) {
        let Some(barrier) = &self.barrier else {
            return;
        };

        let timeout = match self.deadline {
            Some(deadline) if deadline.has_passed() => {
                tracing::warn!(host, "Start deadline already passed, not waiting on barrier");
                Some(Duration::ZERO)
            }
            Some(deadline) => {
                let remaining = deadline.remaining();
                tracing::info!(
                    host,
                    wait_secs = remaining.as_secs(),
                    "Ready and waiting on barrier, will wait at most {} seconds",
                    remaining.as_secs()
                );
                Some(remaining)
            }
            None => {
                tracing::info!(host, "Ready and waiting on barrier");
                None
            }
        };

        match barrier.arrive(timeout).await {
            BarrierOutcome::TimedOut => tracing::warn!(
                host,
                missing = barrier.remaining(),
                "Barrier timed out, proceeding unsynchronized"
            ),
            outcome => tracing::debug!(host, ?outcome, "Released from barrier"),
        }
    }

    /// Post-process a finished command
    ///
    /// Never fails: any problem while extracting metadata falls back to the
    /// unmodified output.
    fn inspect(&self, host: &str, output: CommandOutput) -> CommandOutput {
        if !output.is_success() {
            tracing::warn!(
                host,
                exit_code = output.exit_code,
                stderr = output.stderr.trim_end(),
                "Script returned error"
            );
            return output;
        }

        tracing::info!(host, "Test finished");
        match strip_metadata(self.sink.as_ref(), host, &output.stdout) {
            Ok(Some(stdout)) => CommandOutput { stdout, ..output },
            Ok(None) => output,
            Err(err) => {
                tracing::error!(host, error = %err, "Error during postprocessing results");
                output
            }
        }
    }
}

#[async_trait]
impl RemoteExecutor for Interceptor {
    fn name(&self) -> &str {
        "interceptor"
    }

    async fn execute(
        &self,
        session: &dyn Session,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let host = session.host();

        let Some(transfer) = session.file_transfer() else {
            tracing::error!(
                host,
                executor = self.inner.name(),
                "Session exposes no file transfer channel; the executor interface changed"
            );
            return Err(RemoteError::Compatibility(format!(
                "session for {host} does not expose a file transfer channel"
            )));
        };

        tracing::debug!(host, entries = self.manifest.len(), "Staging");
        if let Err(err) = stage_over(transfer, &self.manifest).await {
            tracing::error!(host, error = %err, "Staging failed");
            return Err(err.into());
        }

        tracing::info!(host, "Start io test");
        self.synchronize(host).await;

        tracing::debug!(host, %command, "Executing");
        let output = match self.inner.execute(session, command).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(
                    host,
                    executor = self.inner.name(),
                    error = %err,
                    "Remote execution raised"
                );
                return Err(err);
            }
        };

        tracing::debug!(host, exit_code = output.exit_code, "Inspecting");
        let output = self.inspect(host, output);
        tracing::debug!(host, "Done");
        Ok(output)
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("inner", &self.inner.name())
            .field("manifest", &self.manifest)
            .field("barrier", &self.barrier)
            .field("deadline", &self.deadline)
            .finish()
    }
}
