//! Local session: a host simulated by a directory

use std::path::{Component, Path, PathBuf};

use fleet_bench_core::{FileTransfer, Session, TransferError};

use crate::transfer::LocalTransfer;

/// Map a remote path onto `root`
///
/// Absolute remote paths are taken relative to `root`. Paths that escape
/// `root` through `..` are rejected.
pub fn resolve_remote(root: &Path, remote: &str) -> Result<PathBuf, TransferError> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(remote).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::ParentDir => {
                return Err(TransferError::InvalidRemotePath(remote.to_string()));
            }
        }
    }

    if depth == 0 {
        return Err(TransferError::InvalidRemotePath(remote.to_string()));
    }
    Ok(resolved)
}

/// A host backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalSession {
    host: String,
    root: PathBuf,
    transfer: Option<LocalTransfer>,
}

impl LocalSession {
    /// Create a session for `host` rooted at `root`
    pub fn new(host: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            host: host.into(),
            transfer: Some(LocalTransfer::new(root.clone())),
            root,
        }
    }

    /// Create a session that offers no file transfer
    pub fn without_transfer(host: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            root: root.into(),
            transfer: None,
        }
    }

    /// Directory standing in for the host's filesystem root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path a remote path maps to on this host
    pub fn resolve(&self, remote: &str) -> Result<PathBuf, TransferError> {
        resolve_remote(&self.root, remote)
    }
}

impl Session for LocalSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn file_transfer(&self) -> Option<&dyn FileTransfer> {
        self.transfer.as_ref().map(|t| t as &dyn FileTransfer)
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_and_relative() {
        let root = Path::new("/var/fleet/vm-0");
        assert_eq!(
            resolve_remote(root, "/tmp/io_tool").unwrap(),
            root.join("tmp/io_tool")
        );
        assert_eq!(
            resolve_remote(root, "./data/profile.ini").unwrap(),
            root.join("data/profile.ini")
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let root = Path::new("/var/fleet/vm-0");
        assert!(matches!(
            resolve_remote(root, "/tmp/../../etc/passwd"),
            Err(TransferError::InvalidRemotePath(_))
        ));
        assert!(resolve_remote(root, "/").is_err());
        assert!(resolve_remote(root, "").is_err());
    }

    #[test]
    fn test_session_capabilities() {
        let session = LocalSession::new("vm-0", "/var/fleet/vm-0");
        assert_eq!(session.host(), "vm-0");
        assert!(session.file_transfer().is_some());
        assert_eq!(session.working_dir(), Some(Path::new("/var/fleet/vm-0")));

        let bare = LocalSession::without_transfer("vm-1", "/var/fleet/vm-1");
        assert!(bare.file_transfer().is_none());
    }
}
