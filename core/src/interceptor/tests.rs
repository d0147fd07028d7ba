//! Tests for the interceptor module

use super::*;
use crate::barrier::StartBarrier;
use crate::command::{CommandOutput, RemoteCommand};
use crate::deadline::Deadline;
use crate::error::ErrorKind;
use crate::staging::{StagingEntry, StagingError, StagingManifest};
use crate::traits::{
    FileTransfer, MetadataSink, RemoteError, RemoteExecutor, Session, SinkError, TransferChannel,
    TransferError,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Executor
// ============================================================================

struct MockExecutor {
    output: CommandOutput,
    fail: bool,
    calls: AtomicUsize,
}

impl MockExecutor {
    fn returning(output: CommandOutput) -> Self {
        Self {
            output,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            output: CommandOutput::default(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        session: &dyn Session,
        _command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemoteError::Transport {
                host: session.host().to_string(),
                message: "connection reset".into(),
            });
        }
        Ok(self.output.clone())
    }
}

// ============================================================================
// Mock Session and Transfer
// ============================================================================

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct RecordingChannel {
    journal: Journal,
}

#[async_trait]
impl TransferChannel for RecordingChannel {
    async fn copy_file(&mut self, _local: &Path, remote: &str) -> Result<(), TransferError> {
        self.journal.push(format!("file {remote}"));
        Ok(())
    }

    async fn copy_directory(&mut self, _local: &Path, remote: &str) -> Result<(), TransferError> {
        self.journal.push(format!("dir {remote}"));
        Ok(())
    }

    fn close(&mut self) {
        self.journal.push("close");
    }
}

struct RecordingTransfer {
    journal: Journal,
}

#[async_trait]
impl FileTransfer for RecordingTransfer {
    async fn open_channel(&self) -> Result<Box<dyn TransferChannel>, TransferError> {
        self.journal.push("open");
        Ok(Box::new(RecordingChannel {
            journal: self.journal.clone(),
        }))
    }
}

struct MockSession {
    host: String,
    transfer: Option<RecordingTransfer>,
}

impl MockSession {
    fn new(host: &str, journal: &Journal) -> Self {
        Self {
            host: host.to_string(),
            transfer: Some(RecordingTransfer {
                journal: journal.clone(),
            }),
        }
    }

    fn without_transfer(host: &str) -> Self {
        Self {
            host: host.to_string(),
            transfer: None,
        }
    }
}

impl Session for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn file_transfer(&self) -> Option<&dyn FileTransfer> {
        self.transfer.as_ref().map(|t| t as &dyn FileTransfer)
    }
}

// ============================================================================
// Mock Sink
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    payloads: Mutex<Vec<Value>>,
    reject: bool,
}

impl RecordingSink {
    fn rejecting() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }
}

impl MetadataSink for RecordingSink {
    fn on_metadata(&self, _host: &str, payload: Value) -> Result<(), SinkError> {
        self.payloads.lock().unwrap().push(payload);
        if self.reject {
            return Err(SinkError::Rejected("sink offline".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn interceptor(executor: Arc<MockExecutor>, sink: Arc<RecordingSink>) -> Interceptor {
    InterceptorBuilder::new(executor)
        .metadata_sink(sink)
        .build()
        .expect("interceptor")
}

async fn run(
    executor: Arc<MockExecutor>,
    sink: Arc<RecordingSink>,
) -> Result<CommandOutput, RemoteError> {
    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);
    interceptor(executor, sink)
        .execute(&session, &RemoteCommand::new("true"))
        .await
}

fn staged_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, name).unwrap();
    path
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_missing_sink() {
    let result = InterceptorBuilder::new(Arc::new(MockExecutor::failing())).build();

    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);
    assert!(err.message.contains("metadata_sink"));
}

// ============================================================================
// Result inspection
// ============================================================================

#[tokio::test]
async fn test_metadata_extracted_and_stripped() {
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(
        0,
        r#"{"a": 1, "__meta__": {"x": 2}}"#,
        "",
    )));
    let sink = Arc::new(RecordingSink::default());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(sink.payloads(), vec![json!({"x": 2})]);
    let stdout: Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(stdout, json!({"a": 1}));
    assert_eq!(output.exit_code, 0);
}

#[tokio::test]
async fn test_plain_text_passes_through() {
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, "plain text", "")));
    let sink = Arc::new(RecordingSink::default());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(output.stdout, "plain text");
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn test_json_without_meta_passes_through_unchanged() {
    let stdout = "{\"a\":   1}\n";
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, stdout, "")));
    let sink = Arc::new(RecordingSink::default());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(output.stdout, stdout);
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn test_non_zero_exit_bypasses_inspection() {
    let original = CommandOutput::new(7, r#"{"__meta__": {"x": 1}}"#, "disk full\n");
    let executor = Arc::new(MockExecutor::returning(original.clone()));
    let sink = Arc::new(RecordingSink::default());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(output, original);
    assert!(sink.payloads().is_empty());
}

#[tokio::test]
async fn test_sink_failure_returns_original_stdout() {
    let stdout = r#"{"a": 1, "__meta__": {"x": 2}}"#;
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, stdout, "")));
    let sink = Arc::new(RecordingSink::rejecting());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(output.stdout, stdout);
    assert_eq!(sink.payloads().len(), 1);
}

#[tokio::test]
async fn test_stripping_keeps_numbers_exact() {
    let stdout = r#"{"bytes": 123456789012345678901234567890, "lat": 1.10, "__meta__": {"x": 2}}"#;
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, stdout, "")));
    let sink = Arc::new(RecordingSink::default());

    let output = run(executor, Arc::clone(&sink)).await.unwrap();

    assert_eq!(
        output.stdout,
        r#"{"bytes":123456789012345678901234567890,"lat":1.10}"#
    );
    assert_eq!(sink.payloads(), vec![json!({"x": 2})]);
}

// ============================================================================
// Pipeline errors
// ============================================================================

#[tokio::test]
async fn test_missing_transfer_is_compatibility_error() {
    let executor = Arc::new(MockExecutor::returning(CommandOutput::default()));
    let sink = Arc::new(RecordingSink::default());
    let session = MockSession::without_transfer("host-0");

    let err = interceptor(Arc::clone(&executor), sink)
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Compatibility(_)));
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_staging_failure_stops_before_execution() {
    let dir = tempfile::tempdir().unwrap();
    let first = staged_file(dir.path(), "first");
    let missing = dir.path().join("missing");
    let third = staged_file(dir.path(), "third");

    let manifest = StagingManifest::try_from(vec![
        StagingEntry::new(&first, "/r/first"),
        StagingEntry::new(&missing, "/r/missing"),
        StagingEntry::new(&third, "/r/third"),
    ])
    .unwrap();

    let executor = Arc::new(MockExecutor::returning(CommandOutput::default()));
    let interceptor = InterceptorBuilder::new(Arc::clone(&executor) as Arc<dyn RemoteExecutor>)
        .manifest(manifest)
        .metadata_sink(Arc::new(RecordingSink::default()))
        .build()
        .unwrap();

    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);
    let err = interceptor
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap_err();

    match err {
        RemoteError::Staging(StagingError::UnsupportedSource { path, .. }) => {
            assert_eq!(path, missing)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        journal.lines(),
        vec!["open", "file /r/first", "close"]
    );
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_executor_error_passes_through() {
    let executor = Arc::new(MockExecutor::failing());
    let sink = Arc::new(RecordingSink::default());

    let err = run(Arc::clone(&executor), sink).await.unwrap_err();

    match err {
        RemoteError::Transport { host, message } => {
            assert_eq!(host, "host-0");
            assert_eq!(message, "connection reset");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(executor.calls(), 1);
}

// ============================================================================
// Barrier synchronization
// ============================================================================

#[tokio::test]
async fn test_participants_start_together() {
    let barrier = Arc::new(StartBarrier::new(3).unwrap());
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, "ok", "")));
    let interceptor = Arc::new(
        InterceptorBuilder::new(Arc::clone(&executor) as Arc<dyn RemoteExecutor>)
            .metadata_sink(Arc::new(RecordingSink::default()))
            .barrier(Arc::clone(&barrier))
            .deadline(Deadline::after(Duration::from_secs(30)))
            .build()
            .unwrap(),
    );

    let journal = Journal::default();
    let mut handles = Vec::new();
    for i in 0..2 {
        let interceptor = Arc::clone(&interceptor);
        let journal = journal.clone();
        handles.push(tokio::spawn(async move {
            let session = MockSession::new(&format!("host-{i}"), &journal);
            interceptor
                .execute(&session, &RemoteCommand::new("true"))
                .await
        }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Two of three have arrived; nobody may have executed yet
    assert_eq!(executor.calls(), 0);
    assert_eq!(barrier.remaining(), 1);

    let session = MockSession::new("host-2", &journal);
    interceptor
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(executor.calls(), 3);
    assert!(barrier.is_released());
}

#[tokio::test(start_paused = true)]
async fn test_barrier_timeout_is_not_an_error() {
    let barrier = Arc::new(StartBarrier::new(2).unwrap());
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, "ok", "")));
    let interceptor = InterceptorBuilder::new(Arc::clone(&executor) as Arc<dyn RemoteExecutor>)
        .metadata_sink(Arc::new(RecordingSink::default()))
        .barrier(Arc::clone(&barrier))
        .deadline(Deadline::after(Duration::from_secs(5)))
        .build()
        .unwrap();

    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);
    let start = tokio::time::Instant::now();
    let output = interceptor
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap();

    assert_eq!(output.stdout, "ok");
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(!barrier.is_released());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_passed_deadline_does_not_wait() {
    let barrier = Arc::new(StartBarrier::new(2).unwrap());
    let deadline = Deadline::after(Duration::from_secs(1));
    tokio::time::advance(Duration::from_secs(2)).await;

    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, "ok", "")));
    let interceptor = InterceptorBuilder::new(Arc::clone(&executor) as Arc<dyn RemoteExecutor>)
        .metadata_sink(Arc::new(RecordingSink::default()))
        .barrier(Arc::clone(&barrier))
        .deadline(deadline)
        .build()
        .unwrap();

    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);
    let start = tokio::time::Instant::now();
    interceptor
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::ZERO);
    // The late arrival is still counted
    assert_eq!(barrier.remaining(), 1);
}

// ============================================================================
// Scoped activation
// ============================================================================

fn slot_with(executor: Arc<MockExecutor>) -> ExecutorSlot {
    ExecutorSlot::new(executor)
}

fn meta_interceptor(slot: &ExecutorSlot, sink: Arc<RecordingSink>) -> Interceptor {
    InterceptorBuilder::new(slot.original())
        .metadata_sink(sink)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_scope_restores_original_on_exit() {
    let stdout = r#"{"a": 1, "__meta__": {"x": 2}}"#;
    let executor = Arc::new(MockExecutor::returning(CommandOutput::new(0, stdout, "")));
    let slot = slot_with(executor);
    let sink = Arc::new(RecordingSink::default());
    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);

    let inside = slot
        .scoped(meta_interceptor(&slot, Arc::clone(&sink)), |_| async {
            slot.execute(&session, &RemoteCommand::new("true")).await
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&inside.stdout).unwrap(), json!({"a": 1}));
    assert!(!slot.is_intercepted());

    let after = slot
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap();
    assert_eq!(after.stdout, stdout);
    assert_eq!(sink.payloads().len(), 1);
}

#[tokio::test]
async fn test_scope_restores_original_after_executor_error() {
    let executor = Arc::new(MockExecutor::failing());
    let slot = slot_with(Arc::clone(&executor));
    let journal = Journal::default();
    let session = MockSession::new("host-0", &journal);

    let result = slot
        .scoped(
            meta_interceptor(&slot, Arc::new(RecordingSink::default())),
            |intercepted| async move {
                intercepted
                    .execute(&session, &RemoteCommand::new("true"))
                    .await
            },
        )
        .await
        .unwrap();

    assert!(result.is_err());
    assert!(!slot.is_intercepted());
    assert_eq!(slot.current().name(), "mock");

    // Back to the original: no staging happens any more
    let session = MockSession::without_transfer("host-0");
    let err = slot
        .execute(&session, &RemoteCommand::new("true"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Transport { .. }));
    assert_eq!(executor.calls(), 2);
}

#[test]
fn test_scope_restores_original_after_panic() {
    let slot = slot_with(Arc::new(MockExecutor::failing()));
    let interceptor = meta_interceptor(&slot, Arc::new(RecordingSink::default()));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = slot.intercept(interceptor).unwrap();
        assert_eq!(slot.current().name(), "interceptor");
        panic!("workload blew up");
    }));

    assert!(result.is_err());
    assert!(!slot.is_intercepted());
    assert_eq!(slot.current().name(), "mock");
}

#[test]
fn test_nested_activation_rejected() {
    let slot = slot_with(Arc::new(MockExecutor::failing()));
    let sink = Arc::new(RecordingSink::default());

    let guard = slot.intercept(meta_interceptor(&slot, Arc::clone(&sink))).unwrap();
    let err = slot
        .intercept(meta_interceptor(&slot, Arc::clone(&sink)))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Usage);
    // The rejected attempt leaves the active scope intact
    assert!(slot.is_intercepted());
    assert_eq!(slot.current().name(), "interceptor");

    drop(guard);
    assert!(!slot.is_intercepted());
    assert!(slot.intercept(meta_interceptor(&slot, sink)).is_ok());
}

#[test]
fn test_guard_debug_names_both_executors() {
    let slot = slot_with(Arc::new(MockExecutor::failing()));
    let guard = slot
        .intercept(meta_interceptor(&slot, Arc::new(RecordingSink::default())))
        .unwrap();

    let debug = format!("{guard:?}");
    assert!(debug.contains("InterceptionGuard"));
    assert!(debug.contains("original: \"mock\""));
    assert!(debug.contains("executor: \"interceptor\""));
}
