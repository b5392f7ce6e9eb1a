use super::FileIdentity;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

pub(super) fn identity(metadata: &Metadata) -> FileIdentity {
    FileIdentity::new(metadata.ino(), metadata.dev())
}
