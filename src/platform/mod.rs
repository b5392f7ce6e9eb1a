//! File identity independent of the path, used to tell "same file" from "a
//! different file now living at this path".
//!
//! Unix uses inode and device numbers. Windows uses the volume serial number
//! and the NTFS file index, which give the same guarantee on local volumes.
//! Other platforms fall back to a hash of the canonical path and creation
//! time: a rotated file moved under a new name is then NOT recognised as the
//! predecessor, so its unread tail is lost on rotation.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub inode: u64,
    pub device: u64,
}

impl FileIdentity {
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }

    /// A zero inode or device never belongs to a real file, so it marks
    /// "nothing recorded yet".
    pub fn is_unknown(&self) -> bool {
        self.inode == 0 || self.device == 0
    }

    /// Compares the current file against the checkpointed identity. An
    /// unknown previous identity counts as not rotated.
    pub fn is_rotated_from(&self, previous: &FileIdentity) -> bool {
        !previous.is_unknown() && self != previous
    }
}

pub fn file_identity(path: &Path) -> Result<FileIdentity> {
    let metadata = fs::metadata(path).map_err(|e| Error::io("stat", path, e))?;
    identity_from_metadata(path, &metadata)
}

#[cfg(unix)]
pub fn identity_from_metadata(_path: &Path, metadata: &fs::Metadata) -> Result<FileIdentity> {
    Ok(unix::identity(metadata))
}

#[cfg(windows)]
pub fn identity_from_metadata(path: &Path, _metadata: &fs::Metadata) -> Result<FileIdentity> {
    windows::identity(path)
}

#[cfg(not(any(unix, windows)))]
pub fn identity_from_metadata(path: &Path, metadata: &fs::Metadata) -> Result<FileIdentity> {
    use std::hash::Hasher as _;
    use std::time::UNIX_EPOCH;
    use twox_hash::XxHash64;

    let canonical = fs::canonicalize(path).map_err(|e| Error::io("canonicalize", path, e))?;
    let created = metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = XxHash64::with_seed(0);
    hasher.write(canonical.to_string_lossy().as_bytes());
    let inode = hasher.finish().max(1);
    let mut hasher = XxHash64::with_seed(1);
    hasher.write(&created.to_le_bytes());
    let device = hasher.finish().max(1);
    Ok(FileIdentity { inode, device })
}

/// Finds the regular file in `dir` whose identity equals `identity`.
///
/// Linear in the number of directory entries, which is fine for log
/// directories holding a handful of rotated generations.
pub fn search_file_by_identity(dir: &Path, identity: &FileIdentity) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io("read directory", dir, e))?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        match identity_from_metadata(&path, &metadata) {
            Ok(candidate) if candidate == *identity => return Ok(path),
            _ => {}
        }
    }

    Err(Error::PredecessorNotFound {
        dir: dir.to_path_buf(),
        inode: identity.inode,
        device: identity.device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_previous_is_not_rotated() {
        let current = FileIdentity::new(42, 7);
        assert!(!current.is_rotated_from(&FileIdentity::default()));
        assert!(!current.is_rotated_from(&FileIdentity::new(0, 7)));
        assert!(!current.is_rotated_from(&FileIdentity::new(42, 0)));
    }

    #[test]
    fn test_same_identity_is_not_rotated() {
        let current = FileIdentity::new(42, 7);
        assert!(!current.is_rotated_from(&FileIdentity::new(42, 7)));
    }

    #[test]
    fn test_different_identity_is_rotated() {
        let current = FileIdentity::new(42, 7);
        assert!(current.is_rotated_from(&FileIdentity::new(41, 7)));
        assert!(current.is_rotated_from(&FileIdentity::new(42, 8)));
    }

    #[test]
    fn test_real_file_identity_is_known() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(&path, "x").unwrap();
        let identity = file_identity(&path).unwrap();
        assert!(!identity.is_unknown());
        assert_eq!(identity, file_identity(&path).unwrap());
    }

    #[test]
    fn test_file_identity_missing_file() {
        let dir = tempdir().unwrap();
        let err = file_identity(&dir.path().join("nope.log")).unwrap_err();
        assert!(matches!(err, Error::Io { op: "stat", .. }));
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_search_finds_renamed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(&path, "old").unwrap();
        let identity = file_identity(&path).unwrap();

        let rotated = dir.path().join("access.log.1");
        fs::rename(&path, &rotated).unwrap();
        fs::write(&path, "new").unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();

        let found = search_file_by_identity(dir.path(), &identity).unwrap();
        assert_eq!(found, rotated);
    }

    #[test]
    fn test_search_reports_missing_predecessor() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("access.log"), "new").unwrap();
        let err = search_file_by_identity(dir.path(), &FileIdentity::new(u64::MAX, u64::MAX))
            .unwrap_err();
        assert!(matches!(err, Error::PredecessorNotFound { .. }));
    }
}
