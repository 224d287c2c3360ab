use std::path::{Path, PathBuf};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// A locally stored video file, sized once when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMediaHandle {
    path: PathBuf,
    size_bytes: u64,
}

impl LocalMediaHandle {
    /// Opens a handle on `path`.
    ///
    /// The path must name a non-empty regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(TransferError::NotAFile(path.display().to_string()));
        }
        if meta.len() == 0 {
            return Err(TransferError::EmptyMedia(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
        })
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location as a display string.
    pub fn uri(&self) -> String {
        self.path.display().to_string()
    }

    /// Total length in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// File name, used as a default title.
    pub fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// A byte range `[offset, offset + len)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: u64,
    pub len: usize,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }
}

/// Raw bytes read from the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn range(&self) -> ChunkRange {
        ChunkRange {
            offset: self.offset,
            len: self.data.len(),
        }
    }
}

/// Number of chunks needed to send `total` bytes: `ceil(total / chunk_size)`.
pub fn chunk_count(total: u64, chunk_size: usize) -> u64 {
    let chunk_size = effective_chunk_size(chunk_size) as u64;
    total.div_ceil(chunk_size)
}

fn effective_chunk_size(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    }
}

/// Iterator over the ranges a clean, fault-free transfer sends.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    next: u64,
    total: u64,
    chunk_size: usize,
}

impl ChunkPlan {
    pub fn new(total: u64, chunk_size: usize) -> Self {
        Self {
            next: 0,
            total,
            chunk_size: effective_chunk_size(chunk_size),
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        if self.next >= self.total {
            return None;
        }
        let len = (self.total - self.next).min(self.chunk_size as u64) as usize;
        let range = ChunkRange {
            offset: self.next,
            len,
        };
        self.next += len as u64;
        Some(range)
    }
}

/// Outcome of applying a host-confirmed offset to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The offset moved forward by this many bytes.
    Advanced(u64),
    /// The host reported the offset we already had.
    Stalled,
}

/// Upload progress as confirmed by the host.
///
/// Invariant: `0 <= offset <= total_size`, and the offset never moves
/// backwards.
#[derive(Debug, Clone)]
pub struct TransferCursor {
    uploaded_offset: u64,
    total_size: u64,
    chunk_size: usize,
}

impl TransferCursor {
    /// Creates a cursor at offset 0. A `chunk_size` of 0 selects
    /// [`DEFAULT_CHUNK_SIZE`].
    pub fn new(total_size: u64, chunk_size: usize) -> Self {
        Self {
            uploaded_offset: 0,
            total_size,
            chunk_size: effective_chunk_size(chunk_size),
        }
    }

    pub fn offset(&self) -> u64 {
        self.uploaded_offset
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn remaining(&self) -> u64 {
        self.total_size - self.uploaded_offset
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_offset == self.total_size
    }

    /// Range to send next; `None` once complete. The final range is
    /// clipped to the remaining bytes.
    pub fn next_range(&self) -> Option<ChunkRange> {
        if self.is_complete() {
            return None;
        }
        Some(ChunkRange {
            offset: self.uploaded_offset,
            len: self.remaining().min(self.chunk_size as u64) as usize,
        })
    }

    /// Applies an offset reported by the host.
    ///
    /// The host value is taken as-is rather than `offset + chunk_len`, so a
    /// partial write leaves the cursor where the host stopped.
    pub fn confirm(&mut self, confirmed: u64) -> Result<Advance, TransferError> {
        if confirmed > self.total_size {
            return Err(TransferError::OffsetOverrun {
                confirmed,
                total: self.total_size,
            });
        }
        if confirmed < self.uploaded_offset {
            return Err(TransferError::OffsetRegressed {
                current: self.uploaded_offset,
                confirmed,
            });
        }
        if confirmed == self.uploaded_offset {
            return Ok(Advance::Stalled);
        }
        let delta = confirmed - self.uploaded_offset;
        self.uploaded_offset = confirmed;
        Ok(Advance::Advanced(delta))
    }
}
