//! Shared start deadline

use std::time::Duration;

use tokio::time::Instant;

/// Cap for preparation windows too large to represent as an instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Latest point at which a participant should still wait at the barrier
///
/// Computed once per run; participants arriving later proceed without
/// waiting. Uses monotonic time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline at an explicit instant
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Deadline `max_preparation` from now
    ///
    /// Windows past the representable range are clamped to roughly 30 years.
    pub fn after(max_preparation: Duration) -> Self {
        let now = Instant::now();
        Self(
            now.checked_add(max_preparation)
                .unwrap_or_else(|| now + FAR_FUTURE),
        )
    }

    /// The instant this deadline expires
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left, zero once passed
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Check if the deadline is in the past
    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(300));
        assert_eq!(deadline.remaining(), Duration::from_secs(300));

        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(deadline.remaining(), Duration::from_secs(200));
        assert!(!deadline.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_passed_deadline_saturates() {
        let deadline = Deadline::after(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(deadline.has_passed());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_preparation_window_is_clamped() {
        let config = crate::config::RunConfig::default().with_max_preparation_secs(u64::MAX);
        assert!(config.validate().is_ok());

        let deadline = Deadline::after(config.max_preparation());
        assert!(!deadline.has_passed());
        assert_eq!(deadline.remaining(), FAR_FUTURE);

        assert_eq!(Deadline::after(Duration::MAX).remaining(), FAR_FUTURE);
    }
}
