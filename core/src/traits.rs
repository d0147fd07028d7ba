//! Collaborator traits for remote execution, file transfer and result sinks
//!
//! These traits are defined in core so the interceptor can decorate any
//! executor. Implementations live in their own crates (hosts/).

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::BenchResult;
use crate::orchestrator::RunOutcome;
use crate::staging::StagingError;
use crate::task::TaskDefinition;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Remote Executor
// ============================================================================

/// Runs a command on the host behind a session
///
/// The interceptor implements this trait around another executor, so callers
/// never need to know whether staging and start synchronization are active.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Executor identifier used in logs (e.g., "local", "interceptor")
    fn name(&self) -> &str;

    /// Run `command` on the session's host and wait for it to finish
    ///
    /// A non-zero exit code is a normal result, not an error.
    async fn execute(
        &self,
        session: &dyn Session,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError>;
}

/// Connection to a single host
pub trait Session: Send + Sync {
    /// Host name or address, for logs
    fn host(&self) -> &str;

    /// File transfer capability, if this session supports one
    fn file_transfer(&self) -> Option<&dyn FileTransfer>;

    /// Working directory commands run in, when the session pins one
    fn working_dir(&self) -> Option<&Path> {
        None
    }
}

/// Executor errors
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The session no longer provides a capability the interceptor relies on
    #[error("compatibility error: {0}")]
    Compatibility(String),

    /// Files could not be staged before the command ran
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The command could not be started
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line that failed
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The connection to the host failed
    #[error("transport error on {host}: {message}")]
    Transport {
        /// Host the session points at
        host: String,
        /// Error detail
        message: String,
    },

    /// The command did not finish in time
    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// File Transfer
// ============================================================================

/// Opens file transfer channels over a session
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Open a new channel
    async fn open_channel(&self) -> Result<Box<dyn TransferChannel>, TransferError>;
}

/// An open file transfer channel (sftp-like)
#[async_trait]
pub trait TransferChannel: Send {
    /// Copy a single regular file to `remote`
    async fn copy_file(&mut self, local: &Path, remote: &str) -> Result<(), TransferError>;

    /// Copy a directory tree to `remote`
    async fn copy_directory(&mut self, local: &Path, remote: &str) -> Result<(), TransferError>;

    /// Release the channel. Must be idempotent.
    fn close(&mut self);
}

/// File transfer errors
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Filesystem or socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel used after close
    #[error("transfer channel is closed")]
    Closed,

    /// Remote path is not acceptable to the channel
    #[error("invalid remote path {0:?}")]
    InvalidRemotePath(String),

    /// Any other transfer failure
    #[error("transfer failed: {0}")]
    Other(String),
}

// ============================================================================
// Metadata Sink
// ============================================================================

/// Receives metadata payloads stripped from command results
///
/// Called synchronously from the interceptor. Implementations must not block;
/// the shipped collector is a non-blocking channel push.
pub trait MetadataSink: Send + Sync {
    /// Accept one payload reported by `host`
    fn on_metadata(&self, host: &str, payload: serde_json::Value) -> Result<(), SinkError>;
}

/// Metadata sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Sink buffer is full
    #[error("metadata sink is full")]
    Full,

    /// Receiving side is gone
    #[error("metadata sink is closed")]
    Closed,

    /// Payload was refused
    #[error("metadata rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Task Submitter
// ============================================================================

/// Submits a task definition to the framework that drives the participants
///
/// Called once per run, inside the interception scope. Every participant the
/// submitter launches must execute through `executor`.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    /// Submitter identifier for logs
    fn name(&self) -> &str;

    /// Run the task and report per-participant outcomes
    async fn submit(
        &self,
        task: &TaskDefinition,
        executor: Arc<dyn RemoteExecutor>,
    ) -> BenchResult<RunOutcome>;
}
