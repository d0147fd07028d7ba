//! Builder pattern for RunOrchestrator construction

use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::interceptor::ExecutorSlot;
use crate::traits::{RemoteExecutor, TaskSubmitter};

use super::executor::RunOrchestrator;

/// Builder for creating a RunOrchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = RunOrchestratorBuilder::new()
///     .participants(4)
///     .max_preparation_secs(60)
///     .executor(executor)
///     .submitter(submitter)
///     .build()?;
/// ```
pub struct RunOrchestratorBuilder {
    config: RunConfig,
    slot: Option<Arc<ExecutorSlot>>,
    submitter: Option<Arc<dyn TaskSubmitter>>,
}

impl RunOrchestratorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            slot: None,
            submitter: None,
        }
    }

    /// Set the full run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the participant count
    pub fn participants(mut self, participants: usize) -> Self {
        self.config.participants = Some(participants);
        self
    }

    /// Set the maximum preparation time in seconds
    pub fn max_preparation_secs(mut self, secs: u64) -> Self {
        self.config.max_preparation_secs = secs;
        self
    }

    /// Dispatch through an existing executor slot
    pub fn slot(mut self, slot: Arc<ExecutorSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Dispatch through a new slot around `executor`
    pub fn executor(self, executor: Arc<dyn RemoteExecutor>) -> Self {
        self.slot(Arc::new(ExecutorSlot::new(executor)))
    }

    /// Set the task submitter
    pub fn submitter(mut self, submitter: Arc<dyn TaskSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the executor or submitter are not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<RunOrchestrator> {
        let slot = self
            .slot
            .ok_or_else(|| BenchError::missing_config("executor"))?;

        let submitter = self
            .submitter
            .ok_or_else(|| BenchError::missing_config("submitter"))?;

        self.config.validate()?;

        Ok(RunOrchestrator::new(self.config, slot, submitter))
    }
}

impl Default for RunOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
