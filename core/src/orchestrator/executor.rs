//! Orchestrator execution logic

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::barrier::StartBarrier;
use crate::config::RunConfig;
use crate::deadline::Deadline;
use crate::error::BenchResult;
use crate::interceptor::{ExecutorSlot, InterceptorBuilder};
use crate::metadata::{MetadataCollector, MetadataRecord};
use crate::staging::StagingManifest;
use crate::task::{TaskDefinition, WorkloadTool};
use crate::traits::TaskSubmitter;

use super::aggregator::{aggregate_outcomes, AggregatedStats, RunOutcome};

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Participant count the barrier was created for
    pub participants: usize,

    /// Whether every participant reached the barrier before the deadline
    pub barrier_released: bool,

    /// Per-participant outcomes
    pub outcome: RunOutcome,

    /// Metadata payloads extracted from results
    pub metadata: Vec<MetadataRecord>,

    /// Summary statistics
    pub stats: AggregatedStats,
}

impl RunReport {
    /// Check if the run succeeded
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Orchestrator manages one synchronized run
///
/// Responsible for creating the barrier, activating interception for the
/// duration of the task submission, and collecting results.
pub struct RunOrchestrator {
    /// Run configuration
    pub(crate) config: RunConfig,

    /// Dispatch entry participants execute through
    pub(crate) slot: Arc<ExecutorSlot>,

    /// Framework that launches participants
    pub(crate) submitter: Arc<dyn TaskSubmitter>,
}

impl RunOrchestrator {
    /// Create a new orchestrator
    ///
    /// Use `RunOrchestratorBuilder` for a more ergonomic construction.
    pub fn new(config: RunConfig, slot: Arc<ExecutorSlot>, submitter: Arc<dyn TaskSubmitter>) -> Self {
        Self {
            config,
            slot,
            submitter,
        }
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Get the executor slot
    pub fn slot(&self) -> &Arc<ExecutorSlot> {
        &self.slot
    }

    /// Staging manifest for `tool`: the tool binary first, then configured extras
    pub fn workload_manifest(
        &self,
        tool: WorkloadTool,
        test_dir: &Path,
    ) -> BenchResult<StagingManifest> {
        let mut manifest = StagingManifest::new();
        manifest.insert(tool.staging_entry(test_dir, &self.config.remote_tool_path))?;
        manifest.extend(self.config.staging.clone())?;
        Ok(manifest)
    }

    /// Run the task with synchronized start
    ///
    /// The participant count comes from the configuration when set (and is
    /// written into the task definition), otherwise from the task definition.
    pub async fn run(
        &self,
        mut task: TaskDefinition,
        manifest: StagingManifest,
    ) -> BenchResult<RunReport> {
        let participants = match self.config.participants {
            Some(n) => {
                task.set_concurrency(n)?;
                n
            }
            None => task.concurrency()?,
        };

        let barrier = Arc::new(StartBarrier::new(participants)?);
        let deadline = Deadline::after(self.config.max_preparation());
        let (collector, mut metadata_rx) =
            MetadataCollector::channel(&self.config.channel, participants);

        let interceptor = InterceptorBuilder::new(self.slot.original())
            .manifest(manifest)
            .metadata_sink(Arc::new(collector))
            .barrier(Arc::clone(&barrier))
            .deadline(deadline)
            .build()?;

        tracing::info!(
            participants,
            max_preparation_secs = self.config.max_preparation_secs,
            submitter = self.submitter.name(),
            "Starting run"
        );

        let start = Instant::now();
        let submitted = self
            .slot
            .scoped(interceptor, |executor| self.submitter.submit(&task, executor))
            .await?;
        let elapsed = start.elapsed();

        let outcome = match submitted {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Task submission failed");
                return Err(e);
            }
        };

        let metadata = MetadataCollector::drain(&mut metadata_rx);
        let stats = aggregate_outcomes(&outcome, metadata.len(), elapsed);

        tracing::info!(
            elapsed_secs = elapsed.as_secs_f64(),
            succeeded = stats.succeeded,
            failed = stats.failed,
            errored = stats.errored,
            metadata = stats.metadata_records,
            barrier_released = barrier.is_released(),
            "Run completed"
        );

        Ok(RunReport {
            participants,
            barrier_released: barrier.is_released(),
            outcome,
            metadata,
            stats,
        })
    }
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("config", &self.config)
            .field("slot", &self.slot)
            .field("submitter", &self.submitter.name())
            .finish()
    }
}
