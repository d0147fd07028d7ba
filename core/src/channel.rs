//! Sizing of the metadata collector's queue

use serde::{Deserialize, Serialize};

/// Bounds on the queue between interceptors and the run's collector
///
/// Records are drained once every participant has finished, so the queue
/// has to hold a whole run's worth. A full queue makes the interceptor hand
/// back the unstripped stdout instead of dropping the record silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Records buffered before `__meta__` payloads are refused
    pub metadata_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            metadata_buffer: 10_000,
        }
    }
}

impl ChannelConfig {
    /// Set the number of records buffered per run
    pub fn with_metadata_buffer(mut self, size: usize) -> Self {
        self.metadata_buffer = size;
        self
    }

    /// Queue capacity for a run of `participants`
    ///
    /// Never below one record per participant, never zero.
    pub fn capacity_for(&self, participants: usize) -> usize {
        self.metadata_buffer.max(participants).max(1)
    }
}
