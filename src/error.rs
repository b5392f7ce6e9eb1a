use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load pos file {}: {source}", path.display())]
    PositionDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to update pos file {}: {source}", path.display())]
    PositionWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not get file identity of {}: {reason}", path.display())]
    Identity { path: PathBuf, reason: String },

    #[error("no file with inode {inode} on device {device} in {}", dir.display())]
    PredecessorNotFound {
        dir: PathBuf,
        inode: u64,
        device: u64,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("no log file configured")]
    NoTargets,

    #[error("all {count} log files failed, last error on {target}: {source}")]
    AllTargetsFailed {
        count: usize,
        target: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
