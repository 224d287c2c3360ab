//! Registers a transferred asset with the backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moments_protocol::VideoRecord;
use tracing::{info, warn};

use crate::error::{RemoteError, UploadError};
use crate::remote::{RecordStore, VideoHost};
use crate::retry::RetryPolicy;
use crate::types::{OrphanPolicy, RecordMetadata, RemoteAsset};

/// Upper bound on deleting an orphaned asset.
pub const ORPHAN_DELETE_TIMEOUT: Duration = Duration::from_secs(30);

/// A record the backend accepted.
#[derive(Debug, Clone)]
pub struct Registration {
    pub record: VideoRecord,
    /// Id the backend answered with.
    pub record_id: String,
}

/// Creates the backend record for an uploaded asset.
///
/// The record id is generated once per call to [`register`](Self::register)
/// and reused across retries, so a repeated POST after a lost response
/// cannot create a second record with a different id.
pub struct Finalizer<'a> {
    store: &'a dyn RecordStore,
    host: &'a dyn VideoHost,
    retry: RetryPolicy,
    orphan_policy: OrphanPolicy,
}

impl<'a> Finalizer<'a> {
    pub fn new(store: &'a dyn RecordStore, host: &'a dyn VideoHost) -> Self {
        Self {
            store,
            host,
            retry: RetryPolicy::default(),
            orphan_policy: OrphanPolicy::Keep,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Builds the record for `asset`, validating required fields.
    pub fn build_record(
        asset: &RemoteAsset,
        metadata: &RecordMetadata,
        video_id: String,
        upload_time: DateTime<Utc>,
    ) -> Result<VideoRecord, UploadError> {
        if metadata.user_id.trim().is_empty() {
            return Err(UploadError::Validation("user id is required".into()));
        }
        if asset.playback_url.trim().is_empty() {
            return Err(UploadError::Validation("playback URL is required".into()));
        }
        Ok(VideoRecord {
            video_id,
            user_id: metadata.user_id.clone(),
            video_url: asset.playback_url.clone(),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            is_public: metadata.is_public,
            upload_time,
            view_count: 0,
            likes: 0,
            comments: Vec::new(),
        })
    }

    /// Persists the record, retrying transient failures.
    ///
    /// Validation failures return before any network call. A definitive
    /// refusal, or running out of attempts, applies the orphan policy and
    /// returns [`UploadError::Registration`].
    pub async fn register(
        &self,
        asset: &RemoteAsset,
        metadata: &RecordMetadata,
    ) -> Result<Registration, UploadError> {
        let video_id = uuid::Uuid::new_v4().to_string();
        let record = Self::build_record(asset, metadata, video_id, Utc::now())?;

        let mut attempt: u32 = 0;
        let failure = loop {
            attempt += 1;
            match self.store.create_record(&record).await {
                Ok(record_id) => {
                    info!(
                        video_id = %record.video_id,
                        record_id = %record_id,
                        url = %record.video_url,
                        "video registered"
                    );
                    return Ok(Registration { record, record_id });
                }
                Err(e) if e.is_retryable() && self.retry.allows(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        video_id = %record.video_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break e,
            }
        };

        warn!(
            video_id = %record.video_id,
            asset = %asset.asset_id,
            error = %failure,
            "registration failed"
        );
        let orphan = self.handle_orphan(asset).await;
        Err(UploadError::Registration {
            message: registration_message(&failure),
            status: failure.status(),
            orphan,
        })
    }

    /// Applies the orphan policy; returns the asset if it is still on the
    /// host.
    async fn handle_orphan(&self, asset: &RemoteAsset) -> Option<RemoteAsset> {
        match self.orphan_policy {
            OrphanPolicy::Keep => Some(asset.clone()),
            OrphanPolicy::DeleteRemote => {
                match tokio::time::timeout(ORPHAN_DELETE_TIMEOUT, self.host.delete_asset(asset))
                    .await
                {
                    Ok(Ok(())) => {
                        info!(asset = %asset.asset_id, "orphaned asset deleted");
                        None
                    }
                    Ok(Err(e)) => {
                        warn!(asset = %asset.asset_id, error = %e, "failed to delete orphaned asset");
                        Some(asset.clone())
                    }
                    Err(_) => {
                        warn!(asset = %asset.asset_id, "orphan deletion timed out");
                        Some(asset.clone())
                    }
                }
            }
        }
    }
}

fn registration_message(e: &RemoteError) -> String {
    match e {
        RemoteError::Rejected { message, .. } if !message.is_empty() => message.clone(),
        other => other.to_string(),
    }
}
