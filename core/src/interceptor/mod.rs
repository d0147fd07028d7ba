//! Command interception around a remote executor
//!
//! The [`Interceptor`] decorates a [`RemoteExecutor`](crate::RemoteExecutor)
//! and runs a fixed pipeline on every invocation:
//!
//! 1. Check that the session can open a file transfer channel
//! 2. Stage the manifest to the host (fail-fast, channel always closed)
//! 3. Arrive at the start barrier, bounded by the run deadline
//! 4. Run the wrapped executor, passing its errors through unchanged
//! 5. On exit code 0, hand any `__meta__` payload to the metadata sink and
//!    strip it from stdout
//!
//! Interception is activated on an [`ExecutorSlot`], the process-wide
//! dispatch entry, and undone when the returned guard is dropped.
//!
//! # Example
//!
//! ```ignore
//! use fleet_bench_core::{ExecutorSlot, InterceptorBuilder};
//!
//! let slot = ExecutorSlot::new(executor);
//! let interceptor = InterceptorBuilder::new(slot.original())
//!     .manifest(manifest)
//!     .metadata_sink(collector)
//!     .barrier(barrier)
//!     .deadline(deadline)
//!     .build()?;
//!
//! let outcome = slot
//!     .scoped(interceptor, |executor| submitter.submit(&task, executor))
//!     .await??;
//! ```

mod builder;
mod pipeline;
mod slot;

pub use builder::InterceptorBuilder;
pub use pipeline::Interceptor;
pub use slot::{ExecutorSlot, InterceptionGuard};

#[cfg(test)]
mod tests;
