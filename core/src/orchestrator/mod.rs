//! Orchestrator for one synchronized test run
//!
//! The RunOrchestrator ties the pieces of a run together:
//! - Creating the start barrier and deadline for the participant count
//! - Creating the metadata collector
//! - Activating interception on the executor slot
//! - Submitting the task once inside the interception scope
//! - Collecting participant outcomes and metadata into a report
//!
//! # Example
//!
//! ```ignore
//! use fleet_bench_core::{RunConfig, RunOrchestratorBuilder};
//!
//! let orchestrator = RunOrchestratorBuilder::new()
//!     .config(RunConfig::default().with_participants(4))
//!     .executor(executor)
//!     .submitter(submitter)
//!     .build()?;
//!
//! let report = orchestrator.run(task, manifest).await?;
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{
    aggregate_outcomes, AggregatedStats, ParticipantOutcome, ParticipantStatus, RunOutcome,
};
pub use builder::RunOrchestratorBuilder;
pub use executor::{RunOrchestrator, RunReport};
