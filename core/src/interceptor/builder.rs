//! Builder pattern for Interceptor construction

use std::sync::Arc;

use crate::barrier::StartBarrier;
use crate::deadline::Deadline;
use crate::error::{BenchError, BenchResult};
use crate::staging::StagingManifest;
use crate::traits::{MetadataSink, RemoteExecutor};

use super::pipeline::Interceptor;

/// Builder for creating Interceptor instances
///
/// # Example
/// ```ignore
/// let interceptor = InterceptorBuilder::new(executor)
///     .manifest(manifest)
///     .metadata_sink(collector)
///     .barrier(barrier)
///     .deadline(Deadline::after(Duration::from_secs(300)))
///     .build()?;
/// ```
pub struct InterceptorBuilder {
    inner: Arc<dyn RemoteExecutor>,
    manifest: StagingManifest,
    sink: Option<Arc<dyn MetadataSink>>,
    barrier: Option<Arc<StartBarrier>>,
    deadline: Option<Deadline>,
}

impl InterceptorBuilder {
    /// Create a builder decorating `inner`
    pub fn new(inner: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            inner,
            manifest: StagingManifest::default(),
            sink: None,
            barrier: None,
            deadline: None,
        }
    }

    /// Set the staging manifest
    pub fn manifest(mut self, manifest: StagingManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Set the metadata sink
    pub fn metadata_sink(mut self, sink: Arc<dyn MetadataSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the start barrier shared by all participants
    pub fn barrier(mut self, barrier: Arc<StartBarrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Set the start deadline
    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build the Interceptor
    ///
    /// # Errors
    /// Returns an error if no metadata sink was set.
    pub fn build(self) -> BenchResult<Interceptor> {
        let sink = self
            .sink
            .ok_or_else(|| BenchError::missing_config("metadata_sink"))?;

        Ok(Interceptor {
            inner: self.inner,
            manifest: Arc::new(self.manifest),
            sink,
            barrier: self.barrier,
            deadline: self.deadline,
        })
    }
}
