//! Metadata extraction from command results
//!
//! Workload scripts may print a single JSON object whose `__meta__` member
//! carries run metadata. The member is handed to a [`MetadataSink`] and
//! removed before the result goes back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::channel::ChannelConfig;
use crate::traits::{MetadataSink, SinkError};

/// Reserved top-level key holding the metadata payload
pub const META_KEY: &str = "__meta__";

/// Split `stdout` into its metadata payload and the remaining object
///
/// Returns `None` when `stdout` is not a JSON object or has no metadata key.
pub fn split_metadata(stdout: &str) -> Option<(Value, Map<String, Value>)> {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(stdout) else {
        return None;
    };
    let payload = object.remove(META_KEY)?;
    Some((payload, object))
}

/// Errors while handing off metadata or re-serializing the result
#[derive(Debug, thiserror::Error)]
pub(crate) enum InspectError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("failed to serialize stripped result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Hand the payload in `stdout` to `sink` and return the stripped stdout
///
/// `Ok(None)` means there was nothing to extract.
pub(crate) fn strip_metadata(
    sink: &dyn MetadataSink,
    host: &str,
    stdout: &str,
) -> Result<Option<String>, InspectError> {
    let Some((payload, rest)) = split_metadata(stdout) else {
        return Ok(None);
    };
    sink.on_metadata(host, payload)?;
    Ok(Some(serde_json::to_string(&Value::Object(rest))?))
}

/// Metadata payload reported by one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Host that produced the payload
    pub host: String,
    /// The `__meta__` value
    pub payload: Value,
    /// When the interceptor extracted it
    pub received_at: DateTime<Utc>,
}

/// Non-blocking metadata sink backed by a bounded channel
#[derive(Debug, Clone)]
pub struct MetadataCollector {
    tx: mpsc::Sender<MetadataRecord>,
}

impl MetadataCollector {
    /// Create a collector for `participants` and the receiver its records arrive on
    pub fn channel(
        config: &ChannelConfig,
        participants: usize,
    ) -> (Self, mpsc::Receiver<MetadataRecord>) {
        let (tx, rx) = mpsc::channel(config.capacity_for(participants));
        (Self { tx }, rx)
    }

    /// Drain every record currently buffered in `rx`
    pub fn drain(rx: &mut mpsc::Receiver<MetadataRecord>) -> Vec<MetadataRecord> {
        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        records
    }
}

impl MetadataSink for MetadataCollector {
    fn on_metadata(&self, host: &str, payload: Value) -> Result<(), SinkError> {
        let record = MetadataRecord {
            host: host.to_string(),
            payload,
            received_at: Utc::now(),
        };
        self.tx.try_send(record).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
