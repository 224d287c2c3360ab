//! Upload orchestrator for concurrent multi-file uploads.
//!
//! Runs one pipeline per file on its own task, aggregates events, and
//! supports cancellation. A failing upload does not affect the others.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::UploadPipeline;
use crate::remote::{RecordStore, VideoHost};
use crate::types::{UploadEvent, UploadOptions, UploadReport, UploadRequest};

/// Orchestrates uploads of several files.
pub struct UploadOrchestrator {
    pipeline: UploadPipeline,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(
        host: Arc<dyn VideoHost>,
        store: Arc<dyn RecordStore>,
        options: UploadOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            pipeline: UploadPipeline::new(host, store, options),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are sent without waiting, so a receiver that is never taken
    /// or drained late loses events once the buffer fills but never stalls
    /// an upload.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Cancels every upload started by this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads every request concurrently.
    ///
    /// Returns one report per request, in request order.
    pub async fn upload_all(&self, requests: Vec<UploadRequest>) -> Vec<UploadReport> {
        let mut reports: Vec<Option<UploadReport>> = vec![None; requests.len()];
        let mut tasks = JoinSet::new();

        for (index, request) in requests.iter().cloned().enumerate() {
            let pipeline = self.pipeline.clone();
            let events_tx = self.events_tx.clone();
            let cancel = self.cancel.child_token();
            tasks.spawn(async move {
                (index, upload_one(&pipeline, request, &cancel, &events_tx).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => error!(error = %e, "upload task panicked"),
            }
        }

        reports
            .into_iter()
            .zip(requests)
            .map(|(report, request)| {
                report.unwrap_or_else(|| UploadReport {
                    upload_id: request.upload_id,
                    path: request.path,
                    success: false,
                    error: Some("upload task aborted".into()),
                    user_message: Some("The upload stopped unexpectedly.".into()),
                    video_url: None,
                    record_id: None,
                })
            })
            .collect()
    }
}

async fn upload_one(
    pipeline: &UploadPipeline,
    request: UploadRequest,
    cancel: &CancellationToken,
    events_tx: &mpsc::Sender<UploadEvent>,
) -> UploadReport {
    let upload_id = request.upload_id.clone();

    match pipeline.run(&request, cancel, events_tx).await {
        Ok(outcome) => {
            let _ = events_tx.try_send(UploadEvent::Completed {
                upload_id: upload_id.clone(),
                video_url: outcome.asset.playback_url.clone(),
                record_id: outcome.record_id.clone(),
            });
            info!(upload = %upload_id, record = %outcome.record_id, "upload completed");

            UploadReport {
                upload_id,
                path: request.path,
                success: true,
                error: None,
                user_message: None,
                video_url: Some(outcome.asset.playback_url),
                record_id: Some(outcome.record_id),
            }
        }
        Err(e) => {
            let err_msg = e.to_string();
            let _ = events_tx.try_send(UploadEvent::Failed {
                upload_id: upload_id.clone(),
                error: err_msg.clone(),
            });

            UploadReport {
                upload_id,
                path: request.path,
                success: false,
                error: Some(err_msg),
                user_message: Some(e.user_message()),
                video_url: None,
                record_id: None,
            }
        }
    }
}
