//! Local side of a resumable video upload.
//!
//! Reads a media file in bounded byte ranges from arbitrary offsets,
//! tracks the host-confirmed offset, and optionally stages a verified
//! temporary copy of the source before the transfer starts.

mod chunked;
mod progress;
mod staging;
mod types;

pub use chunked::{ChunkReader, calculate_file_checksum, checksum_bytes};
pub use progress::SpeedCalculator;
pub use staging::StagedMedia;
pub use types::{Advance, Chunk, ChunkPlan, ChunkRange, LocalMediaHandle, TransferCursor, chunk_count};

/// Default chunk size: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {offset} is beyond end of file ({size} bytes)")]
    OffsetOutOfRange { offset: u64, size: u64 },

    #[error("media file is empty: {0}")]
    EmptyMedia(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("confirmed offset {confirmed} went backwards from {current}")]
    OffsetRegressed { current: u64, confirmed: u64 },

    #[error("confirmed offset {confirmed} exceeds total size {total}")]
    OffsetOverrun { confirmed: u64, total: u64 },
}
