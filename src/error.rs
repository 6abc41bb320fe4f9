use std::{io, path::PathBuf};

use crate::Segment;

/// Errors produced while decoding or unpacking a boot image
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Android boot magic not found in the first 512 bytes")]
    MagicNotFound,
    /// The page size is zero or not a power of two.
    #[error("invalid page size {0:#x}: must be a nonzero power of two")]
    InvalidPageSize(u32),
    /// The input ended before a segment was fully read.
    #[error("truncated image: {segment:?} declares {expected} bytes but only {actual} remain")]
    Truncated {
        segment: Segment,
        expected: u32,
        actual: u64,
    },
    #[error("failed to decode boot image header")]
    Header(#[from] binrw::Error),
    #[error("failed to read boot image")]
    Io(#[from] io::Error),
    #[error("failed to write {}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
