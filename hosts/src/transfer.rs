//! Local file transfer into a host directory

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fleet_bench_core::{FileTransfer, TransferChannel, TransferError};
use walkdir::WalkDir;

use crate::session::resolve_remote;

/// Opens channels that copy into a host root
#[derive(Debug, Clone)]
pub struct LocalTransfer {
    root: PathBuf,
}

impl LocalTransfer {
    /// Create a transfer for the host rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileTransfer for LocalTransfer {
    async fn open_channel(&self) -> Result<Box<dyn TransferChannel>, TransferError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::trace!(root = %self.root.display(), "Opened local transfer channel");
        Ok(Box::new(LocalChannel {
            root: self.root.clone(),
            open: true,
        }))
    }
}

/// An open local transfer channel
#[derive(Debug)]
pub struct LocalChannel {
    root: PathBuf,
    open: bool,
}

impl LocalChannel {
    fn target(&self, remote: &str) -> Result<PathBuf, TransferError> {
        if !self.open {
            return Err(TransferError::Closed);
        }
        resolve_remote(&self.root, remote)
    }
}

#[async_trait]
impl TransferChannel for LocalChannel {
    async fn copy_file(&mut self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let target = self.target(remote)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(local, &target).await?;
        tracing::debug!(local = %local.display(), remote, bytes, "Copied file");
        Ok(())
    }

    async fn copy_directory(&mut self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let target = self.target(remote)?;
        let source = local.to_path_buf();
        let files = tokio::task::spawn_blocking(move || copy_tree(&source, &target))
            .await
            .map_err(|e| TransferError::Other(format!("copy task failed: {e}")))??;
        tracing::debug!(local = %local.display(), remote, files, "Copied directory");
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            tracing::trace!(root = %self.root.display(), "Closed local transfer channel");
        }
    }
}

/// Copy the tree under `src` to `dst`, returning the number of files copied
fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}
