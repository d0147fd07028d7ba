//! Run configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;
use crate::staging::{StagingEntry, StagingManifest};

/// Default time participants may spend staging before the start deadline
pub const DEFAULT_MAX_PREPARATION_SECS: u64 = 300;

/// Default destination of the workload tool binary on each host
pub const DEFAULT_REMOTE_TOOL_PATH: &str = "/tmp/io_tool";

/// Default interpreter for the workload script
pub const DEFAULT_INTERPRETER: &str = "python3";

fn default_max_preparation_secs() -> u64 {
    DEFAULT_MAX_PREPARATION_SECS
}

fn default_remote_tool_path() -> String {
    DEFAULT_REMOTE_TOOL_PATH.to_string()
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

/// Run configuration
///
/// Defines how many participants start together, how long they may prepare,
/// and what gets staged on every host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Participant count; taken from the task definition when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<usize>,

    /// Seconds from run start until the barrier stops holding participants
    #[serde(default = "default_max_preparation_secs")]
    pub max_preparation_secs: u64,

    /// Where the workload tool binary lands on each host
    #[serde(default = "default_remote_tool_path")]
    pub remote_tool_path: String,

    /// Interpreter that runs the workload script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra files staged after the tool binary
    #[serde(default, skip_serializing_if = "StagingManifest::is_empty")]
    pub staging: StagingManifest,

    /// Channel buffer configuration
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            participants: None,
            max_preparation_secs: DEFAULT_MAX_PREPARATION_SECS,
            remote_tool_path: default_remote_tool_path(),
            interpreter: default_interpreter(),
            staging: StagingManifest::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(ConfigError::Parse)
    }

    /// Set the participant count
    pub fn with_participants(mut self, participants: usize) -> Self {
        self.participants = Some(participants);
        self
    }

    /// Set the maximum preparation time
    pub fn with_max_preparation_secs(mut self, secs: u64) -> Self {
        self.max_preparation_secs = secs;
        self
    }

    /// Set the remote tool path
    pub fn with_remote_tool_path(mut self, path: impl Into<String>) -> Self {
        self.remote_tool_path = path.into();
        self
    }

    /// Add an extra staging entry
    pub fn with_staging(mut self, entry: StagingEntry) -> Result<Self, ConfigError> {
        self.staging.insert(entry)?;
        Ok(self)
    }

    /// Maximum preparation time as a duration
    pub fn max_preparation(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_preparation_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participants == Some(0) {
            return Err(ConfigError::InvalidParticipants(
                "participants must be at least 1".into(),
            ));
        }

        if self.max_preparation_secs == 0 {
            return Err(ConfigError::InvalidPreparationTime(
                "max preparation time must be positive".into(),
            ));
        }

        if self.remote_tool_path.trim().is_empty() {
            return Err(ConfigError::InvalidToolPath(
                "remote tool path must not be empty".into(),
            ));
        }

        if self.interpreter.trim().is_empty() {
            return Err(ConfigError::InvalidInterpreter(
                "interpreter must not be empty".into(),
            ));
        }

        if self.channel.metadata_buffer == 0 {
            return Err(ConfigError::InvalidChannel(
                "metadata buffer must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid participant count
    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),

    /// Invalid preparation time
    #[error("Invalid preparation time: {0}")]
    InvalidPreparationTime(String),

    /// Invalid remote tool path
    #[error("Invalid remote tool path: {0}")]
    InvalidToolPath(String),

    /// Invalid interpreter
    #[error("Invalid interpreter: {0}")]
    InvalidInterpreter(String),

    /// Invalid channel configuration
    #[error("Invalid channel configuration: {0}")]
    InvalidChannel(String),

    /// The same local path was staged twice
    #[error("Duplicate staging source: {0:?}")]
    DuplicateStagingSource(PathBuf),

    /// A staging pair was not of the form `LOCAL=REMOTE`
    #[error("Invalid staging pair {0:?}, expected LOCAL=REMOTE")]
    InvalidStagingPair(String),

    /// Config file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
}
