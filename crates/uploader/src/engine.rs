//! Chunked transfer state machine.
//!
//! Sends the media to an open session one chunk at a time. The host's
//! reported offset is authoritative: the next chunk always starts where
//! the host says it stopped, so partial writes and lost responses resend
//! exactly the missing bytes.
//!
//! Faults (timeouts, transport errors, 5xx, offset conflicts, answers that
//! do not move the offset) are retried with backoff. The budget counts
//! consecutive faults and resets on every confirmed advance. Definitive
//! refusals and protocol violations end the transfer immediately.

use std::time::Duration;

use moments_protocol::{UploadPhase, UploadProgress};
use moments_transfer::{Advance, Chunk, ChunkRange, ChunkReader, SpeedCalculator, TransferCursor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, TransferFault, UploadError};
use crate::remote::VideoHost;
use crate::retry::RetryPolicy;
use crate::types::{RemoteAsset, UploadEvent, UploadSession};

const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub asset: RemoteAsset,
    pub total_bytes: u64,
    /// Chunk requests issued, retries included.
    pub chunk_requests: u32,
    pub retries: u32,
}

/// Outcome of one request against the host.
enum Step {
    Advanced(u64),
    Fault(Fault),
}

enum Fault {
    /// The host answered but the offset did not move.
    Stalled,
    Retryable(String),
}

/// Drives one session from offset 0 to its total size.
pub struct TransferEngine<'a> {
    host: &'a dyn VideoHost,
    upload_id: String,
    retry: RetryPolicy,
    chunk_timeout: Duration,
    cancel: CancellationToken,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        host: &'a dyn VideoHost,
        upload_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host,
            upload_id: upload_id.into(),
            retry: RetryPolicy::default(),
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    /// Transfers every byte of `reader`'s file to `session`.
    ///
    /// Returns only once the host has confirmed `session.total_size`
    /// bytes; every other exit is an error.
    pub async fn run(
        &self,
        session: &UploadSession,
        reader: &ChunkReader,
        events: &mpsc::Sender<UploadEvent>,
    ) -> Result<TransferOutcome, UploadError> {
        if reader.file_size() != session.total_size {
            return Err(UploadError::Validation(format!(
                "media is {} bytes but the session expects {}",
                reader.file_size(),
                session.total_size
            )));
        }

        let mut cursor = TransferCursor::new(session.total_size, reader.chunk_size());
        let mut speed = SpeedCalculator::default();
        speed.record(0);
        self.emit_progress(events, &cursor, &speed);

        let mut faults: u32 = 0;
        let mut chunk_requests: u32 = 0;
        let mut retries: u32 = 0;

        while let Some(range) = cursor.next_range() {
            self.check_cancelled()?;

            let chunk = read_chunk(reader, range).await?;
            chunk_requests += 1;

            let step = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                step = self.send(session, &mut cursor, chunk) => step?,
            };

            let reason = match step {
                Step::Advanced(delta) => {
                    faults = 0;
                    speed.record(delta);
                    self.emit_progress(events, &cursor, &speed);
                    continue;
                }
                Step::Fault(Fault::Stalled) => None,
                Step::Fault(Fault::Retryable(reason)) => Some(reason),
            };

            faults += 1;
            let offset = cursor.offset();
            if !self.retry.allows(faults) {
                warn!(
                    upload = %self.upload_id,
                    offset,
                    attempts = faults,
                    "transfer retry budget exhausted"
                );
                let fault = match reason {
                    None => TransferFault::Stalled {
                        offset,
                        attempts: faults,
                    },
                    Some(last_error) => TransferFault::RetriesExhausted {
                        offset,
                        attempts: faults,
                        last_error,
                    },
                };
                return Err(fault.into());
            }

            let reason = reason.unwrap_or_else(|| "host did not advance the offset".into());
            let delay = self.retry.delay_for_attempt(faults);
            retries += 1;
            debug!(
                upload = %self.upload_id,
                offset,
                attempt = faults,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "retrying chunk"
            );
            let _ = events.try_send(UploadEvent::Retrying {
                upload_id: self.upload_id.clone(),
                offset,
                attempt: faults,
                delay,
                reason,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            upload = %self.upload_id,
            bytes = cursor.total_size(),
            chunk_requests,
            retries,
            "transfer complete"
        );
        Ok(TransferOutcome {
            asset: session.asset(),
            total_bytes: cursor.total_size(),
            chunk_requests,
            retries,
        })
    }

    /// Sends one chunk and applies the host's answer to `cursor`.
    async fn send(
        &self,
        session: &UploadSession,
        cursor: &mut TransferCursor,
        chunk: Chunk,
    ) -> Result<Step, UploadError> {
        let offset = chunk.offset;
        let sent = tokio::time::timeout(
            self.chunk_timeout,
            self.host.send_chunk(session, offset, chunk.data),
        )
        .await;

        match sent {
            Err(_) => Ok(Step::Fault(Fault::Retryable(format!(
                "no answer within {}s",
                self.chunk_timeout.as_secs_f64()
            )))),
            Ok(Ok(confirmed)) => self.apply(cursor, confirmed),
            Ok(Err(RemoteError::OffsetConflict)) => self.resync(session, cursor).await,
            Ok(Err(e)) if e.is_retryable() => Ok(Step::Fault(Fault::Retryable(e.to_string()))),
            Ok(Err(e)) => Err(terminal(cursor.offset(), e)),
        }
    }

    /// Re-reads the host offset after a conflict.
    async fn resync(
        &self,
        session: &UploadSession,
        cursor: &mut TransferCursor,
    ) -> Result<Step, UploadError> {
        debug!(upload = %self.upload_id, offset = cursor.offset(), "offset conflict, querying host");
        let held =
            tokio::time::timeout(self.chunk_timeout, self.host.current_offset(session)).await;

        match held {
            Err(_) => Ok(Step::Fault(Fault::Retryable(
                "offset query timed out".into(),
            ))),
            Ok(Ok(confirmed)) => match self.apply(cursor, confirmed)? {
                Step::Fault(Fault::Stalled) => Ok(Step::Fault(Fault::Retryable(
                    "offset conflict".into(),
                ))),
                step => Ok(step),
            },
            Ok(Err(e)) if e.is_retryable() => Ok(Step::Fault(Fault::Retryable(e.to_string()))),
            Ok(Err(e)) => Err(terminal(cursor.offset(), e)),
        }
    }

    fn apply(&self, cursor: &mut TransferCursor, confirmed: u64) -> Result<Step, UploadError> {
        let offset = cursor.offset();
        match cursor.confirm(confirmed) {
            Ok(Advance::Advanced(delta)) => Ok(Step::Advanced(delta)),
            Ok(Advance::Stalled) => Ok(Step::Fault(Fault::Stalled)),
            Err(e) => {
                warn!(upload = %self.upload_id, offset, confirmed, "host offset rejected");
                Err(TransferFault::Protocol {
                    offset,
                    detail: e.to_string(),
                }
                .into())
            }
        }
    }

    fn emit_progress(
        &self,
        events: &mpsc::Sender<UploadEvent>,
        cursor: &TransferCursor,
        speed: &SpeedCalculator,
    ) {
        let _ = events.try_send(UploadEvent::Progress(UploadProgress {
            upload_id: self.upload_id.clone(),
            phase: UploadPhase::Transferring,
            total_bytes: cursor.total_size(),
            uploaded_bytes: cursor.offset(),
            bytes_per_second: speed.bytes_per_second(),
            eta_secs: speed.eta(cursor.remaining()).map(|d| d.as_secs_f64()),
        }));
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }
}

/// Reads `range` off the async runtime.
async fn read_chunk(reader: &ChunkReader, range: ChunkRange) -> Result<Chunk, UploadError> {
    let reader = reader.clone();
    let chunk = tokio::task::spawn_blocking(move || reader.read(range))
        .await
        .map_err(|e| moments_transfer::TransferError::Io(std::io::Error::other(e)))??;
    Ok(chunk)
}

fn terminal(offset: u64, e: RemoteError) -> UploadError {
    let fault = match e {
        RemoteError::Rejected { status, message } => TransferFault::Rejected {
            offset,
            status,
            message,
        },
        other => TransferFault::Protocol {
            offset,
            detail: other.to_string(),
        },
    };
    fault.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChunkReply, MockHost, PLAYBACK_URL, media_file};
    use moments_transfer::LocalMediaHandle;
    use std::sync::atomic::Ordering;

    const MB: usize = 1024 * 1024;

    struct Fixture {
        _dir: tempfile::TempDir,
        reader: ChunkReader,
        session: UploadSession,
    }

    fn fixture(len: usize, chunk_size: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let media = LocalMediaHandle::open(media_file(dir.path(), "clip.mp4", len)).unwrap();
        Fixture {
            reader: ChunkReader::new(&media, chunk_size),
            session: MockHost::session(len as u64),
            _dir: dir,
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }

    fn engine(host: &MockHost) -> TransferEngine<'_> {
        TransferEngine::new(host, "up-1", CancellationToken::new())
            .with_retry(fast_retry(5))
            .with_chunk_timeout(Duration::from_secs(2))
    }

    fn drain(rx: &mut mpsc::Receiver<UploadEvent>) -> Vec<UploadEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn twelve_mb_in_three_chunks() {
        let f = fixture(12 * MB, 5 * MB);
        let host = MockHost::new();
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap();

        assert_eq!(
            host.sends(),
            vec![(0, 5 * MB), (5 * MB as u64, 5 * MB), (10 * MB as u64, 2 * MB)]
        );
        assert_eq!(outcome.asset.playback_url, PLAYBACK_URL);
        assert_eq!(outcome.total_bytes, 12 * MB as u64);
        assert_eq!(outcome.chunk_requests, 3);
        assert_eq!(outcome.retries, 0);

        let uploaded: Vec<u64> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Progress(p) => Some(p.uploaded_bytes),
                _ => None,
            })
            .collect();
        assert_eq!(
            uploaded,
            vec![0, 5 * MB as u64, 10 * MB as u64, 12 * MB as u64]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_stall_resends_same_range() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([
            ChunkReply::Accept,
            ChunkReply::Hang,
            ChunkReply::Stall,
            ChunkReply::Accept,
        ]);
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap();

        assert_eq!(host.sends(), vec![(0, 4), (4, 4), (4, 4), (4, 4), (8, 2)]);
        assert_eq!(host.held(), 10);
        assert_eq!(outcome.retries, 2);
        assert_eq!(outcome.chunk_requests, 5);

        let retried: Vec<(u64, u32)> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Retrying {
                    offset, attempt, ..
                } => Some((offset, attempt)),
                _ => None,
            })
            .collect();
        assert_eq!(retried, vec![(4, 1), (4, 2)]);
    }

    #[tokio::test]
    async fn partial_write_resumes_at_host_offset() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([ChunkReply::Partial(3)]);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap();

        assert_eq!(host.sends(), vec![(0, 4), (3, 4), (7, 3)]);
        assert_eq!(outcome.retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_faults_exhaust_budget() {
        let f = fixture(10, 4);
        let busy = || ChunkReply::Fail(RemoteError::Transient("503 busy".into()));
        let host = MockHost::with_replies([ChunkReply::Accept, busy(), busy(), busy(), busy()]);
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host)
            .with_retry(fast_retry(3))
            .run(&f.session, &f.reader, &tx)
            .await
            .unwrap_err();

        match err {
            UploadError::Transfer(TransferFault::RetriesExhausted {
                offset,
                attempts,
                last_error,
            }) => {
                assert_eq!(offset, 4);
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(host.sends().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_stalls_fail_as_stalled() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies(std::iter::repeat_n(ChunkReply::Stall, 10));
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host)
            .with_retry(fast_retry(3))
            .run(&f.session, &f.reader, &tx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer(TransferFault::Stalled {
                offset: 0,
                attempts: 3
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_resets_fault_budget() {
        let f = fixture(12, 4);
        let busy = || ChunkReply::Fail(RemoteError::Transient("reset".into()));
        let host = MockHost::with_replies([
            busy(),
            ChunkReply::Accept,
            busy(),
            ChunkReply::Accept,
            busy(),
            ChunkReply::Accept,
        ]);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = engine(&host)
            .with_retry(fast_retry(2))
            .run(&f.session, &f.reader, &tx)
            .await
            .unwrap();

        assert_eq!(outcome.retries, 3);
        assert_eq!(host.held(), 12);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([ChunkReply::Fail(RemoteError::Rejected {
            status: 403,
            message: "forbidden".into(),
        })]);
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer(TransferFault::Rejected { status: 403, offset: 0, .. })
        ));
        assert_eq!(host.sends().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_offset_header_is_not_retried() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([
            ChunkReply::Accept,
            ChunkReply::Fail(RemoteError::Malformed(
                "response missing Upload-Offset header".into(),
            )),
        ]);
        let (tx, mut rx) = mpsc::channel(64);

        let err = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap_err();

        match err {
            UploadError::Transfer(TransferFault::Protocol { offset, detail }) => {
                assert_eq!(offset, 4);
                assert!(detail.contains("Upload-Offset"), "{detail}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(host.sends(), vec![(0, 4), (4, 4)]);
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|ev| matches!(ev, UploadEvent::Retrying { .. }))
        );
    }

    #[tokio::test]
    async fn conflict_resyncs_from_host_offset() {
        let f = fixture(10, 4);
        let host = MockHost::new().holding(4);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap();

        assert_eq!(host.sends(), vec![(0, 4), (4, 4), (8, 2)]);
        assert_eq!(host.head_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.retries, 0);
    }

    #[tokio::test]
    async fn offset_regression_is_protocol_error() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([ChunkReply::Accept, ChunkReply::Report(2)]);
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap_err();

        assert!(matches!(
            err,
            UploadError::Transfer(TransferFault::Protocol { offset: 4, .. })
        ));
    }

    #[tokio::test]
    async fn offset_past_end_is_protocol_error() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([ChunkReply::Report(11)]);
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host).run(&f.session, &f.reader, &tx).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Transfer(TransferFault::Protocol { offset: 0, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let f = fixture(10, 4);
        let host = MockHost::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(64);

        let err = TransferEngine::new(&host, "up-1", cancel)
            .run(&f.session, &f.reader, &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert!(host.sends().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_backoff() {
        let f = fixture(10, 4);
        let host = MockHost::with_replies([ChunkReply::Fail(RemoteError::Transient(
            "down".into(),
        ))]);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(64);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                if matches!(ev, UploadEvent::Retrying { .. }) {
                    trigger.cancel();
                    break;
                }
            }
        });

        let retry = RetryPolicy {
            initial_delay: Duration::from_secs(30),
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let err = TransferEngine::new(&host, "up-1", cancel)
            .with_retry(retry)
            .run(&f.session, &f.reader, &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(host.sends().len(), 1);
    }

    #[tokio::test]
    async fn size_mismatch_rejected_before_sending() {
        let f = fixture(10, 4);
        let host = MockHost::new();
        let (tx, _rx) = mpsc::channel(64);

        let err = engine(&host)
            .run(&MockHost::session(11), &f.reader, &tx)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Validation(_)));
        assert!(host.sends().is_empty());
    }
}
