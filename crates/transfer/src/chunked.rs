use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::types::{Chunk, ChunkRange, LocalMediaHandle};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Hex SHA-256 of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex SHA-256 of a whole file, streamed so large videos never sit in memory.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Random-access reader over a media file.
///
/// Every read opens the file afresh, so the reader holds no cursor and the
/// same range can be read any number of times (retries re-read). Safe to
/// share across threads.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    path: PathBuf,
    file_size: u64,
    chunk_size: usize,
}

impl ChunkReader {
    /// Creates a reader for `media`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(media: &LocalMediaHandle, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            path: media.path().to_path_buf(),
            file_size: media.size_bytes(),
            chunk_size,
        }
    }

    /// Reads up to `len` bytes starting at `offset`, clipped to end of file.
    ///
    /// An offset past the end of the file is an error; an offset equal to
    /// the file size yields an empty chunk.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Chunk, TransferError> {
        if offset > self.file_size {
            return Err(TransferError::OffsetOutOfRange {
                offset,
                size: self.file_size,
            });
        }
        let want = (self.file_size - offset).min(len as u64) as usize;
        let mut data = vec![0u8; want];
        if want > 0 {
            let mut file = std::fs::File::open(&self.path)?;
            file.seek(SeekFrom::Start(offset))?;
            // A short read here means the file shrank after it was sized.
            file.read_exact(&mut data)?;
        }
        Ok(Chunk { offset, data })
    }

    /// Reads one chunk-sized range starting at `offset`.
    pub fn read_chunk_at(&self, offset: u64) -> Result<Chunk, TransferError> {
        self.read_range(offset, self.chunk_size)
    }

    /// Reads exactly the given range (clipped to end of file).
    pub fn read(&self, range: ChunkRange) -> Result<Chunk, TransferError> {
        self.read_range(range.offset, range.len)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size in bytes, as measured when the handle was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
