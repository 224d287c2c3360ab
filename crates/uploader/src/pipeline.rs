//! Single-file upload pipeline.

use std::path::Path;
use std::sync::Arc;

use moments_protocol::UploadPhase;
use moments_transfer::{ChunkReader, LocalMediaHandle, StagedMedia};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::TransferEngine;
use crate::error::UploadError;
use crate::finalizer::Finalizer;
use crate::negotiator::Negotiator;
use crate::remote::{RecordStore, VideoHost};
use crate::types::{DisplayMetadata, UploadEvent, UploadOptions, UploadOutcome, UploadRequest};

/// Takes one file from disk to a registered video.
#[derive(Clone)]
pub struct UploadPipeline {
    host: Arc<dyn VideoHost>,
    store: Arc<dyn RecordStore>,
    options: UploadOptions,
}

impl UploadPipeline {
    pub fn new(
        host: Arc<dyn VideoHost>,
        store: Arc<dyn RecordStore>,
        options: UploadOptions,
    ) -> Self {
        Self {
            host,
            store,
            options,
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Runs the pipeline for `request`.
    ///
    /// Phase events go out on `events_tx` without waiting for room; the
    /// final `Completed` or `Failed` event is sent by the caller.
    /// 1. Validate metadata and open the file
    /// 2. Stage a private copy (optional)
    /// 3. Negotiate a session
    /// 4. Transfer chunks
    /// 5. Register the record
    pub async fn run(
        &self,
        request: &UploadRequest,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadOutcome, UploadError> {
        let id = &request.upload_id;
        let result = self.execute(request, cancel, events_tx).await;

        match &result {
            Ok(outcome) => {
                self.emit_phase(events_tx, id, UploadPhase::Registered);
                info!(upload = %id, url = %outcome.asset.playback_url, "upload registered");
            }
            Err(UploadError::Cancelled) => {
                self.emit_phase(events_tx, id, UploadPhase::Cancelled);
                info!(upload = %id, "upload cancelled");
            }
            Err(e) => {
                self.emit_phase(events_tx, id, UploadPhase::Failed);
                error!(upload = %id, error = %e, "upload failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &UploadRequest,
        cancel: &CancellationToken,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadOutcome, UploadError> {
        let id = &request.upload_id;

        // 1. Validate and open
        self.emit_phase(events_tx, id, UploadPhase::Idle);
        if request.metadata.user_id.trim().is_empty() {
            return Err(UploadError::Validation("user id is required".into()));
        }
        check_cancelled(cancel)?;
        let source = LocalMediaHandle::open(&request.path)?;

        // 2. Stage
        let staged = match &self.options.staging_dir {
            Some(dir) => Some(stage(&source, dir).await?),
            None => None,
        };
        let media = staged.as_ref().map_or(&source, |s| s.handle());

        // 3. Negotiate
        check_cancelled(cancel)?;
        self.emit_phase(events_tx, id, UploadPhase::Negotiating);
        let display = self.display_metadata(request, &source);
        let negotiator = Negotiator::new(self.host.as_ref());
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            session = negotiator.negotiate(media, &display) => session?,
        };

        // 4. Transfer
        self.emit_phase(events_tx, id, UploadPhase::Transferring);
        let reader = ChunkReader::new(media, self.options.chunk_size);
        let transfer = TransferEngine::new(self.host.as_ref(), id.clone(), cancel.clone())
            .with_retry(self.options.retry.clone())
            .with_chunk_timeout(self.options.chunk_timeout)
            .run(&session, &reader, events_tx)
            .await?;
        drop(staged);
        self.emit_phase(events_tx, id, UploadPhase::Completed);

        // 5. Register
        let registration = Finalizer::new(self.store.as_ref(), self.host.as_ref())
            .with_retry(self.options.retry.clone())
            .with_orphan_policy(self.options.orphan_policy)
            .register(&transfer.asset, &request.metadata)
            .await?;

        Ok(UploadOutcome {
            upload_id: id.clone(),
            asset: transfer.asset,
            record: registration.record,
            record_id: registration.record_id,
            chunk_requests: transfer.chunk_requests,
            retries: transfer.retries,
        })
    }

    /// Host display fields: title falls back to the file name; privacy
    /// follows the record's visibility.
    fn display_metadata(&self, request: &UploadRequest, source: &LocalMediaHandle) -> DisplayMetadata {
        let meta = &request.metadata;
        let name = if meta.title.trim().is_empty() {
            source.file_stem().unwrap_or_default()
        } else {
            meta.title.clone()
        };
        let privacy_view = if meta.is_public {
            self.options.public_privacy_view.clone()
        } else {
            self.options.private_privacy_view.clone()
        };
        DisplayMetadata {
            name,
            description: meta.description.clone(),
            privacy_view,
        }
    }

    /// Never blocks: with nobody draining the channel the event is dropped.
    fn emit_phase(&self, tx: &mpsc::Sender<UploadEvent>, id: &str, phase: UploadPhase) {
        debug!(upload = %id, %phase, "phase");
        let _ = tx.try_send(UploadEvent::Phase {
            upload_id: id.to_string(),
            phase,
        });
    }
}

async fn stage(source: &LocalMediaHandle, dir: &Path) -> Result<StagedMedia, UploadError> {
    let source = source.clone();
    let dir = dir.to_path_buf();
    let staged = tokio::task::spawn_blocking(move || StagedMedia::stage(&source, &dir))
        .await
        .map_err(|e| moments_transfer::TransferError::Io(std::io::Error::other(e)))??;
    Ok(staged)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled);
    }
    Ok(())
}
