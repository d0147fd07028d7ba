//! Process-wide executor slot with scoped interception

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::command::{CommandOutput, RemoteCommand};
use crate::error::{BenchError, BenchResult};
use crate::traits::{RemoteError, RemoteExecutor, Session};

use super::pipeline::Interceptor;

/// Dispatch entry that callers execute through
///
/// Holds the original executor and, while an interception scope is active,
/// an [`Interceptor`] wrapped around it. At most one scope may be active.
pub struct ExecutorSlot {
    original: Arc<dyn RemoteExecutor>,
    current: RwLock<Arc<dyn RemoteExecutor>>,
    active: AtomicBool,
}

impl ExecutorSlot {
    /// Create a slot dispatching to `original`
    pub fn new(original: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            current: RwLock::new(Arc::clone(&original)),
            original,
            active: AtomicBool::new(false),
        }
    }

    /// The executor installed when no scope is active
    pub fn original(&self) -> Arc<dyn RemoteExecutor> {
        Arc::clone(&self.original)
    }

    /// The executor calls currently dispatch to
    pub fn current(&self) -> Arc<dyn RemoteExecutor> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Check if an interception scope is active
    pub fn is_intercepted(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Install `interceptor` until the returned guard is dropped
    ///
    /// # Errors
    /// Returns a usage error if another scope is already active.
    pub fn intercept(&self, interceptor: Interceptor) -> BenchResult<InterceptionGuard<'_>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BenchError::usage(
                "an interception scope is already active on this executor",
            ));
        }

        let interceptor: Arc<dyn RemoteExecutor> = Arc::new(interceptor);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::clone(&interceptor);
        tracing::debug!(executor = self.original.name(), "Interception installed");

        Ok(InterceptionGuard {
            slot: self,
            executor: interceptor,
        })
    }

    /// Run `f` with interception active, restoring the original afterwards
    ///
    /// `f` receives the intercepting executor. The original is restored
    /// whether `f` completes, returns an error, or panics.
    pub async fn scoped<F, Fut, T>(&self, interceptor: Interceptor, f: F) -> BenchResult<T>
    where
        F: FnOnce(Arc<dyn RemoteExecutor>) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.intercept(interceptor)?;
        let output = f(guard.executor()).await;
        drop(guard);
        Ok(output)
    }

    fn restore(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::clone(&self.original);
        self.active.store(false, Ordering::Release);
        tracing::debug!(executor = self.original.name(), "Interception removed");
    }
}

#[async_trait]
impl RemoteExecutor for ExecutorSlot {
    fn name(&self) -> &str {
        self.original.name()
    }

    async fn execute(
        &self,
        session: &dyn Session,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        let executor = self.current();
        executor.execute(session, command).await
    }
}

impl std::fmt::Debug for ExecutorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorSlot")
            .field("original", &self.original.name())
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

/// Active interception scope; dropping it restores the original executor
#[must_use = "interception is removed as soon as the guard is dropped"]
pub struct InterceptionGuard<'a> {
    slot: &'a ExecutorSlot,
    executor: Arc<dyn RemoteExecutor>,
}

impl InterceptionGuard<'_> {
    /// The intercepting executor
    pub fn executor(&self) -> Arc<dyn RemoteExecutor> {
        Arc::clone(&self.executor)
    }
}

impl std::fmt::Debug for InterceptionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionGuard")
            .field("original", &self.slot.original.name())
            .field("executor", &self.executor.name())
            .finish()
    }
}

impl Drop for InterceptionGuard<'_> {
    fn drop(&mut self) {
        self.slot.restore();
    }
}
