//! Staging manifest and copy-to-remote
//!
//! Every participant copies the manifest's local files and directories to its
//! host before the workload starts. Entries are copied in manifest order and
//! the first failure stops the copy.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::traits::{FileTransfer, TransferChannel, TransferError};

/// One local path and where it goes on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingEntry {
    /// Local file or directory
    pub local: PathBuf,
    /// Destination path on the remote host
    pub remote: String,
}

impl StagingEntry {
    /// Create a new entry
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// Parse a `LOCAL=REMOTE` pair
    pub fn parse(pair: &str) -> Result<Self, ConfigError> {
        match pair.split_once('=') {
            Some((local, remote)) if !local.is_empty() && !remote.is_empty() => {
                Ok(Self::new(local, remote))
            }
            _ => Err(ConfigError::InvalidStagingPair(pair.to_string())),
        }
    }
}

impl std::str::FromStr for StagingEntry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered set of files to stage, unique by local path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StagingEntry>", into = "Vec<StagingEntry>")]
pub struct StagingManifest {
    entries: Vec<StagingEntry>,
}

impl StagingManifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    ///
    /// # Errors
    /// Returns `DuplicateStagingSource` if the local path is already present.
    pub fn insert(&mut self, entry: StagingEntry) -> Result<(), ConfigError> {
        if self.entries.iter().any(|e| e.local == entry.local) {
            return Err(ConfigError::DuplicateStagingSource(entry.local));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Add every entry of `other`, in order
    pub fn extend(&mut self, other: StagingManifest) -> Result<(), ConfigError> {
        other.entries.into_iter().try_for_each(|e| self.insert(e))
    }

    /// Iterate entries in manifest order
    pub fn iter(&self) -> impl Iterator<Item = &StagingEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the manifest is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<StagingEntry>> for StagingManifest {
    type Error = ConfigError;

    fn try_from(entries: Vec<StagingEntry>) -> Result<Self, Self::Error> {
        let mut manifest = Self::new();
        entries.into_iter().try_for_each(|e| manifest.insert(e))?;
        Ok(manifest)
    }
}

impl From<StagingManifest> for Vec<StagingEntry> {
    fn from(manifest: StagingManifest) -> Self {
        manifest.entries
    }
}

/// Staging failures
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Local path is neither a regular file nor a directory
    #[error("can't copy {path:?}: it is neither a file nor a directory ({kind})")]
    UnsupportedSource {
        /// Offending local path
        path: PathBuf,
        /// What the path turned out to be
        kind: &'static str,
    },

    /// The copy itself failed
    #[error("copy {local:?} => {remote:?} failed: {cause}")]
    Transfer {
        /// Local source
        local: PathBuf,
        /// Remote destination
        remote: String,
        /// Underlying transfer error
        #[source]
        cause: TransferError,
    },

    /// The transfer channel could not be opened
    #[error("failed to open transfer channel: {0}")]
    ChannelOpen(#[source] TransferError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    File,
    Directory,
}

/// Resolve what `path` is, following symlinks
async fn classify(path: &Path) -> Result<SourceKind, &'static str> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            // A link that exists but points nowhere is broken, not missing
            return match tokio::fs::symlink_metadata(path).await {
                Ok(_) => Err("unresolvable"),
                Err(_) => Err("missing"),
            };
        }
        Err(_) => return Err("unresolvable"),
    };

    let file_type = meta.file_type();
    if file_type.is_file() {
        return Ok(SourceKind::File);
    }
    if file_type.is_dir() {
        return Ok(SourceKind::Directory);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return Err("fifo");
        }
        if file_type.is_socket() {
            return Err("socket");
        }
        if file_type.is_block_device() {
            return Err("block device");
        }
        if file_type.is_char_device() {
            return Err("char device");
        }
    }

    Err("other")
}

/// Closes the wrapped channel when dropped
pub struct ChannelGuard(Box<dyn TransferChannel>);

impl ChannelGuard {
    /// Take ownership of an open channel
    pub fn new(channel: Box<dyn TransferChannel>) -> Self {
        Self(channel)
    }
}

impl Deref for ChannelGuard {
    type Target = dyn TransferChannel;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for ChannelGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Copy every manifest entry over `channel`, stopping at the first failure
pub async fn stage_manifest(
    channel: &mut dyn TransferChannel,
    manifest: &StagingManifest,
) -> Result<(), StagingError> {
    for entry in manifest.iter() {
        let kind = classify(&entry.local)
            .await
            .map_err(|kind| StagingError::UnsupportedSource {
                path: entry.local.clone(),
                kind,
            })?;

        let copied = match kind {
            SourceKind::File => channel.copy_file(&entry.local, &entry.remote).await,
            SourceKind::Directory => channel.copy_directory(&entry.local, &entry.remote).await,
        };
        copied.map_err(|cause| StagingError::Transfer {
            local: entry.local.clone(),
            remote: entry.remote.clone(),
            cause,
        })?;

        tracing::debug!(
            local = %entry.local.display(),
            remote = %entry.remote,
            kind = ?kind,
            "Staged"
        );
    }
    Ok(())
}

/// Open a channel on `transfer`, stage the manifest, and close the channel
///
/// The channel is closed on every exit path.
pub async fn stage_over(
    transfer: &dyn FileTransfer,
    manifest: &StagingManifest,
) -> Result<(), StagingError> {
    let channel = transfer
        .open_channel()
        .await
        .map_err(StagingError::ChannelOpen)?;
    let mut channel = ChannelGuard::new(channel);
    stage_manifest(&mut *channel, manifest).await
}
