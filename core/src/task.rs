//! Task definition and workload script preparation
//!
//! The task definition is an opaque JSON document owned by the framework
//! that launches participants. Only two locations in it matter here: where
//! the workload script path goes, and where the participant count lives.

use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::{BenchError, BenchResult};
use crate::staging::StagingEntry;

/// Default location of the script path inside the task definition
pub const DEFAULT_SCRIPT_POINTER: &str = "/VMTasks.boot_runcommand_delete/0/args/script";

/// Default location of the participant count inside the task definition
pub const DEFAULT_CONCURRENCY_POINTER: &str =
    "/VMTasks.boot_runcommand_delete/0/runner/concurrency";

/// Script template file name inside the test directory
pub const SCRIPT_TEMPLATE_FILE: &str = "io.py";

/// Task definition file name inside the test directory
pub const TASK_DEFINITION_FILE: &str = "io.json";

const TOOL_ARGS_MARKER: &str = r"INSERT_TOOL_ARGS\(sys\.argv.*?\)";

// ============================================================================
// Task Definition
// ============================================================================

/// A task definition document with known injection points
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    document: Value,
    script_pointer: String,
    concurrency_pointer: String,
}

impl TaskDefinition {
    /// Wrap a parsed document using the default pointers
    pub fn new(document: Value) -> Self {
        Self {
            document,
            script_pointer: DEFAULT_SCRIPT_POINTER.to_string(),
            concurrency_pointer: DEFAULT_CONCURRENCY_POINTER.to_string(),
        }
    }

    /// Parse a task definition from JSON text
    pub fn parse(raw: &str) -> BenchResult<Self> {
        let document = serde_json::from_str(raw)
            .map_err(|e| BenchError::task(format!("invalid task definition: {e}")))?;
        Ok(Self::new(document))
    }

    /// Load a task definition from a file
    pub fn load(path: &Path) -> BenchResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BenchError::io(format!("reading {}", path.display()), &e))?;
        Self::parse(&raw)
    }

    /// Use a different script pointer
    pub fn with_script_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.script_pointer = pointer.into();
        self
    }

    /// Use a different concurrency pointer
    pub fn with_concurrency_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.concurrency_pointer = pointer.into();
        self
    }

    /// The underlying document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Write `script` at the script pointer
    ///
    /// # Errors
    /// Fails if the pointer's parent does not exist in the document.
    pub fn inject_script(&mut self, script: &str) -> BenchResult<()> {
        let pointer = self.script_pointer.clone();
        self.set(&pointer, Value::String(script.to_string()))
    }

    /// Script path currently stored at the script pointer
    pub fn script(&self) -> Option<&str> {
        self.document
            .pointer(&self.script_pointer)
            .and_then(Value::as_str)
    }

    /// Participant count stored at the concurrency pointer
    pub fn concurrency(&self) -> BenchResult<usize> {
        let value = self
            .document
            .pointer(&self.concurrency_pointer)
            .ok_or_else(|| {
                BenchError::task(format!(
                    "task definition has no concurrency at {}",
                    self.concurrency_pointer
                ))
            })?;

        match value.as_u64() {
            Some(n) if n > 0 => usize::try_from(n)
                .map_err(|_| BenchError::task(format!("concurrency {n} is too large"))),
            _ => Err(BenchError::task(format!(
                "concurrency at {} must be a positive integer, got {value}",
                self.concurrency_pointer
            ))),
        }
    }

    /// Overwrite the participant count
    pub fn set_concurrency(&mut self, participants: usize) -> BenchResult<()> {
        let pointer = self.concurrency_pointer.clone();
        self.set(&pointer, Value::from(participants))
    }

    /// Serialize the document
    pub fn to_json_pretty(&self) -> BenchResult<String> {
        serde_json::to_string_pretty(&self.document)
            .map_err(|e| BenchError::task(format!("failed to serialize task definition: {e}")))
    }

    fn set(&mut self, pointer: &str, value: Value) -> BenchResult<()> {
        let (parent, key) = pointer
            .rsplit_once('/')
            .ok_or_else(|| BenchError::task(format!("invalid JSON pointer {pointer:?}")))?;
        let key = key.replace("~1", "/").replace("~0", "~");

        let missing = || BenchError::task(format!("task definition has no {parent:?}"));
        match self.document.pointer_mut(parent).ok_or_else(missing)? {
            Value::Object(map) => {
                map.insert(key, value);
                Ok(())
            }
            Value::Array(items) => {
                let slot = key
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get_mut(idx))
                    .ok_or_else(|| {
                        BenchError::task(format!("task definition has no {pointer:?}"))
                    })?;
                *slot = value;
                Ok(())
            }
            _ => Err(BenchError::task(format!(
                "task definition {parent:?} is not a container"
            ))),
        }
    }
}

// ============================================================================
// Script Template
// ============================================================================

/// Workload script with a tool-arguments marker
#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    source: String,
}

impl ScriptTemplate {
    /// Wrap template text
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load a template from a file
    pub fn load(path: &Path) -> BenchResult<Self> {
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|e| BenchError::io(format!("reading {}", path.display()), &e))
    }

    /// Replace the `INSERT_TOOL_ARGS(sys.argv...)` marker with `tool_args`
    ///
    /// The arguments are written as a list literal of double-quoted strings.
    pub fn render(&self, tool_args: &[String]) -> BenchResult<String> {
        let marker = Regex::new(TOOL_ARGS_MARKER)
            .map_err(|e| BenchError::task(format!("invalid marker pattern: {e}")))?;
        if !marker.is_match(&self.source) {
            return Err(BenchError::task("can't find replace marker in script template"));
        }

        let literal = serde_json::to_string(tool_args)
            .map_err(|e| BenchError::task(format!("failed to encode tool arguments: {e}")))?;
        Ok(marker
            .replace_all(&self.source, NoExpand(&literal))
            .into_owned())
    }
}

// ============================================================================
// Workload Tool
// ============================================================================

/// Storage benchmark tool run on each host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadTool {
    /// iozone
    Iozone,
    /// fio
    Fio,
}

impl WorkloadTool {
    /// Binary file name inside the test directory
    pub fn binary_name(&self) -> &'static str {
        match self {
            WorkloadTool::Iozone => "iozone",
            WorkloadTool::Fio => "fio",
        }
    }

    /// Default script arguments for this tool
    pub fn default_args(&self, remote_tool_path: &str) -> Vec<String> {
        [
            "--type",
            self.binary_name(),
            "-a",
            "randwrite",
            "--iodepth",
            "2",
            "--blocksize",
            "4k",
            "--iosize",
            "20M",
            "--binary-path",
            remote_tool_path,
            "-d",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Staging entry copying the tool binary from `test_dir` to the host
    pub fn staging_entry(&self, test_dir: &Path, remote_tool_path: &str) -> StagingEntry {
        StagingEntry::new(test_dir.join(self.binary_name()), remote_tool_path)
    }
}

impl std::fmt::Display for WorkloadTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary_name())
    }
}

impl std::str::FromStr for WorkloadTool {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iozone" => Ok(WorkloadTool::Iozone),
            "fio" => Ok(WorkloadTool::Fio),
            other => Err(BenchError::config(format!(
                "unknown tool {other:?}, expected iozone or fio"
            ))),
        }
    }
}

/// Split an options string into script arguments
pub fn split_tool_args(opts: &str) -> Vec<String> {
    opts.split_whitespace().map(str::to_string).collect()
}

// ============================================================================
// Prepared Task
// ============================================================================

/// Rendered script and injected task definition, written to a private
/// temporary directory that is removed when this value is dropped
#[derive(Debug)]
pub struct PreparedTask {
    dir: TempDir,
    task: TaskDefinition,
    task_path: PathBuf,
    script_path: PathBuf,
}

impl PreparedTask {
    /// Render the script from `test_dir` and inject it into the task definition
    pub fn prepare(test_dir: &Path, tool_args: &[String]) -> BenchResult<Self> {
        let template = ScriptTemplate::load(&test_dir.join(SCRIPT_TEMPLATE_FILE))?;
        let task = TaskDefinition::load(&test_dir.join(TASK_DEFINITION_FILE))?;
        Self::from_parts(&template, task, tool_args)
    }

    /// Prepare from an already loaded template and task definition
    pub fn from_parts(
        template: &ScriptTemplate,
        mut task: TaskDefinition,
        tool_args: &[String],
    ) -> BenchResult<Self> {
        let script = template.render(tool_args)?;

        let dir = tempfile::Builder::new()
            .prefix("fleet-bench-")
            .tempdir()
            .map_err(|e| BenchError::io("creating temporary directory", &e))?;
        let script_path = dir.path().join(SCRIPT_TEMPLATE_FILE);
        let task_path = dir.path().join(TASK_DEFINITION_FILE);

        std::fs::write(&script_path, script)
            .map_err(|e| BenchError::io(format!("writing {}", script_path.display()), &e))?;
        task.inject_script(&script_path.to_string_lossy())?;
        std::fs::write(&task_path, task.to_json_pretty()?)
            .map_err(|e| BenchError::io(format!("writing {}", task_path.display()), &e))?;

        tracing::debug!(
            script = %script_path.display(),
            task = %task_path.display(),
            "Prepared task files"
        );

        Ok(Self {
            dir,
            task,
            task_path,
            script_path,
        })
    }

    /// The injected task definition
    pub fn task(&self) -> &TaskDefinition {
        &self.task
    }

    /// Mutable access to the injected task definition
    pub fn task_mut(&mut self) -> &mut TaskDefinition {
        &mut self.task
    }

    /// Path of the written task definition
    pub fn task_path(&self) -> &Path {
        &self.task_path
    }

    /// Path of the rendered script
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Directory holding the prepared files
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
