use crate::error::{Error, Result};
use crate::platform::FileIdentity;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Resume point for one target: "read up to byte `offset` of the file with
/// this identity, as of `timestamp`".
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "pos")]
    pub offset: i64,
    #[serde(rename = "time")]
    pub timestamp: f64,
    pub inode: u64,
    #[serde(rename = "dev")]
    pub device: u64,
}

impl Checkpoint {
    pub fn identity(&self) -> FileIdentity {
        FileIdentity::new(self.inode, self.device)
    }
}

pub fn exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Replaces the checkpoint at `path` and returns the timestamp recorded in it.
///
/// The record is written to a sibling temp file and renamed over `path`, so a
/// reader never sees a half-written checkpoint.
pub fn write(path: &Path, offset: i64, identity: &FileIdentity) -> Result<f64> {
    let timestamp = Utc::now().timestamp() as f64;
    let checkpoint = Checkpoint {
        offset,
        timestamp,
        inode: identity.inode,
        device: identity.device,
    };
    let write_err = |source: std::io::Error| Error::PositionWrite {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_vec(&checkpoint).map_err(|e| write_err(e.into()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&body).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(timestamp)
}

pub fn read(path: &Path) -> Result<Checkpoint> {
    let data = fs::read(path).map_err(|e| Error::io("read pos file", path, e))?;
    serde_json::from_slice(&data).map_err(|source| Error::PositionDecode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0-axslog-v4-web");
        let identity = FileIdentity::new(1234, 56);

        let written_at = write(&path, 987_654, &identity).unwrap();
        let checkpoint = read(&path).unwrap();

        assert_eq!(checkpoint.offset, 987_654);
        assert_eq!(checkpoint.identity(), identity);
        assert_eq!(checkpoint.timestamp, written_at);
        assert!(written_at > 0.0);
    }

    #[test]
    fn test_write_overwrites_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pos");
        write(&path, 10, &FileIdentity::new(1, 1)).unwrap();
        write(&path, 20, &FileIdentity::new(2, 2)).unwrap();

        let checkpoint = read(&path).unwrap();
        assert_eq!(checkpoint.offset, 20);
        assert_eq!(checkpoint.identity(), FileIdentity::new(2, 2));
        // only the checkpoint itself is left in the directory
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_reads_existing_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pos");
        fs::write(&path, r#"{"pos":120,"time":1700000000,"inode":99,"dev":2049}"#).unwrap();

        let checkpoint = read(&path).unwrap();
        assert_eq!(checkpoint.offset, 120);
        assert_eq!(checkpoint.timestamp, 1_700_000_000.0);
        assert_eq!(checkpoint.identity(), FileIdentity::new(99, 2049));
    }

    #[test]
    fn test_malformed_checkpoint_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pos");
        fs::write(&path, "{\"pos\":").unwrap();

        let err = read(&path).unwrap_err();
        assert!(matches!(err, Error::PositionDecode { .. }));
    }

    #[test]
    fn test_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pos");
        assert!(!exists(&path));
        write(&path, 0, &FileIdentity::default()).unwrap();
        assert!(exists(&path));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("pos");
        let err = write(&path, 1, &FileIdentity::new(1, 1)).unwrap_err();
        assert!(matches!(err, Error::PositionWrite { .. }));
    }
}
