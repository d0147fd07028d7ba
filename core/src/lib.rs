//! fleet-bench-core: synchronized start and result interception for fleet benchmarks
//!
//! This crate provides the building blocks shared by every fleet-bench
//! component, including:
//!
//! - Core traits (RemoteExecutor, Session, FileTransfer, TaskSubmitter)
//! - The start barrier and preparation deadline
//! - File staging ahead of remote execution
//! - The interceptor that stages, synchronizes, and strips result metadata
//! - The run orchestrator and its report
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod barrier;
pub mod channel;
pub mod command;
pub mod config;
pub mod deadline;
pub mod error;
pub mod interceptor;
pub mod metadata;
pub mod orchestrator;
pub mod staging;
pub mod task;
pub mod traits;

pub use barrier::{BarrierOutcome, StartBarrier};
pub use channel::ChannelConfig;
pub use command::{CommandOutput, RemoteCommand};
pub use config::{ConfigError, RunConfig};
pub use deadline::Deadline;
pub use error::*;
pub use interceptor::{ExecutorSlot, InterceptionGuard, Interceptor, InterceptorBuilder};
pub use metadata::{split_metadata, MetadataCollector, MetadataRecord, META_KEY};
pub use orchestrator::{
    aggregate_outcomes, AggregatedStats, ParticipantOutcome, ParticipantStatus, RunOrchestrator,
    RunOrchestratorBuilder, RunOutcome, RunReport,
};
pub use staging::{stage_manifest, stage_over, StagingEntry, StagingError, StagingManifest};
pub use task::{split_tool_args, PreparedTask, ScriptTemplate, TaskDefinition, WorkloadTool};
pub use traits::*;
