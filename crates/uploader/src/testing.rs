//! In-memory host and store used by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use moments_protocol::VideoRecord;

use crate::error::RemoteError;
use crate::remote::{RecordStore, RemoteFuture, VideoHost};
use crate::types::{DisplayMetadata, RecordMetadata, RemoteAsset, UploadSession};

pub(crate) const PLAYBACK_URL: &str = "https://vimeo.com/1001";
pub(crate) const RESOURCE_ID: &str = "/videos/1001";

/// Scripted answer to one chunk request.
#[derive(Debug, Clone)]
pub(crate) enum ChunkReply {
    /// Persist the whole chunk.
    Accept,
    /// Persist only the first `n` bytes.
    Partial(u64),
    /// Answer without persisting anything.
    Stall,
    Fail(RemoteError),
    /// Never answer.
    Hang,
    /// Report this offset regardless of state.
    Report(u64),
}

/// Host that holds an offset and answers chunk requests from a script.
/// Once the script runs out every chunk is accepted.
#[derive(Default)]
pub(crate) struct MockHost {
    session_error: Mutex<Option<RemoteError>>,
    hang_sessions: AtomicBool,
    hang_deletes: AtomicBool,
    replies: Mutex<VecDeque<ChunkReply>>,
    held: Mutex<u64>,
    pub sends: Mutex<Vec<(u64, usize)>>,
    pub metadata: Mutex<Vec<DisplayMetadata>>,
    pub deleted: Mutex<Vec<String>>,
    pub create_calls: AtomicUsize,
    pub head_calls: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = ChunkReply>) -> Self {
        let host = Self::default();
        host.replies.lock().unwrap().extend(replies);
        host
    }

    pub fn rejecting_sessions(err: RemoteError) -> Self {
        let host = Self::default();
        *host.session_error.lock().unwrap() = Some(err);
        host
    }

    /// Host whose session creation never answers.
    pub fn hanging_sessions() -> Self {
        let host = Self::default();
        host.hang_sessions.store(true, Ordering::SeqCst);
        host
    }

    /// Asset deletion never answers.
    pub fn hanging_deletes(self) -> Self {
        self.hang_deletes.store(true, Ordering::SeqCst);
        self
    }

    /// Pretends an earlier attempt already stored `offset` bytes.
    pub fn holding(self, offset: u64) -> Self {
        *self.held.lock().unwrap() = offset;
        self
    }

    pub fn held(&self) -> u64 {
        *self.held.lock().unwrap()
    }

    pub fn sends(&self) -> Vec<(u64, usize)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn session(total_size: u64) -> UploadSession {
        UploadSession {
            upload_endpoint: "mock://upload/1001".into(),
            resource_id: RESOURCE_ID.into(),
            total_size,
            playback_url: PLAYBACK_URL.into(),
            created_time: None,
        }
    }
}

impl VideoHost for MockHost {
    fn create_session(
        &self,
        total_size: u64,
        metadata: &DisplayMetadata,
    ) -> RemoteFuture<'_, UploadSession> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.lock().unwrap().push(metadata.clone());
        if self.hang_sessions.load(Ordering::SeqCst) {
            return Box::pin(std::future::pending());
        }
        let result = match self.session_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(Self::session(total_size)),
        };
        Box::pin(async move { result })
    }

    fn send_chunk(
        &self,
        _session: &UploadSession,
        offset: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'_, u64> {
        self.sends.lock().unwrap().push((offset, data.len()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ChunkReply::Accept);

        let mut held = self.held.lock().unwrap();
        let result = match reply {
            ChunkReply::Hang => return Box::pin(std::future::pending()),
            ChunkReply::Accept | ChunkReply::Partial(_) if offset != *held => {
                Err(RemoteError::OffsetConflict)
            }
            ChunkReply::Accept => {
                *held += data.len() as u64;
                Ok(*held)
            }
            ChunkReply::Partial(n) => {
                *held += n.min(data.len() as u64);
                Ok(*held)
            }
            ChunkReply::Stall => Ok(*held),
            ChunkReply::Fail(e) => Err(e),
            ChunkReply::Report(v) => Ok(v),
        };
        Box::pin(async move { result })
    }

    fn current_offset(&self, _session: &UploadSession) -> RemoteFuture<'_, u64> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        let held = self.held();
        Box::pin(async move { Ok(held) })
    }

    fn delete_asset(&self, asset: &RemoteAsset) -> RemoteFuture<'_, ()> {
        self.deleted.lock().unwrap().push(asset.asset_id.clone());
        if self.hang_deletes.load(Ordering::SeqCst) {
            return Box::pin(std::future::pending());
        }
        Box::pin(async { Ok(()) })
    }
}

/// Store that records every request and answers from a script, echoing
/// the record's id once the script runs out.
#[derive(Default)]
pub(crate) struct MockStore {
    replies: Mutex<VecDeque<Result<String, RemoteError>>>,
    pub records: Mutex<Vec<VideoRecord>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Result<String, RemoteError>>) -> Self {
        let store = Self::default();
        store.replies.lock().unwrap().extend(replies);
        store
    }

    pub fn records(&self) -> Vec<VideoRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordStore for MockStore {
    fn create_record(&self, record: &VideoRecord) -> RemoteFuture<'_, String> {
        self.records.lock().unwrap().push(record.clone());
        let result = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(record.video_id.clone()));
        Box::pin(async move { result })
    }
}

/// Writes `len` bytes of a repeating pattern to `dir/name`.
pub(crate) fn media_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

pub(crate) fn metadata() -> RecordMetadata {
    RecordMetadata {
        user_id: "user-1".into(),
        title: "Sunset".into(),
        description: "golden hour".into(),
        is_public: true,
    }
}
