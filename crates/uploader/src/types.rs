//! Data types for the upload flow.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moments_protocol::{UploadPhase, UploadProgress, VideoRecord};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// An upload session opened on the video host.
///
/// Valid for one media file; the endpoint does not survive process
/// restarts in any form this crate relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSession {
    /// Where chunks are sent.
    pub upload_endpoint: String,
    /// Host-side identifier of the pending asset.
    pub resource_id: String,
    pub total_size: u64,
    /// Playback location once the transfer completes.
    pub playback_url: String,
    pub created_time: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// The asset this session will produce.
    pub fn asset(&self) -> RemoteAsset {
        RemoteAsset {
            asset_id: self.resource_id.clone(),
            playback_url: self.playback_url.clone(),
            created_time: self.created_time,
        }
    }
}

/// A fully transferred video on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    pub asset_id: String,
    pub playback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
}

/// Display fields sent to the host when the session is opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayMetadata {
    pub name: String,
    pub description: String,
    /// Host privacy setting; empty leaves the account default.
    pub privacy_view: String,
}

/// Owner and display fields of the backend record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

/// What to do with the host asset when registration fails for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave it; the error carries the asset so registration can be retried.
    #[default]
    Keep,
    /// Best-effort delete on the host.
    DeleteRemote,
}

/// Tunables for one upload pipeline.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Upper bound on a single chunk request.
    pub chunk_timeout: Duration,
    /// Copy the source here before uploading. `None` reads it in place.
    pub staging_dir: Option<PathBuf>,
    pub orphan_policy: OrphanPolicy,
    /// Host privacy view for public videos.
    pub public_privacy_view: String,
    /// Host privacy view for private videos.
    pub private_privacy_view: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: moments_transfer::DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            chunk_timeout: Duration::from_secs(60),
            staging_dir: None,
            orphan_policy: OrphanPolicy::Keep,
            public_privacy_view: "anybody".into(),
            private_privacy_view: "nobody".into(),
        }
    }
}

/// One file to upload and register.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Identifies the upload in events and reports.
    pub upload_id: String,
    pub path: PathBuf,
    pub metadata: RecordMetadata,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, metadata: RecordMetadata) -> Self {
        Self {
            upload_id: uuid::Uuid::new_v4().to_string(),
            path: path.into(),
            metadata,
        }
    }
}

/// Successful end of the pipeline.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub upload_id: String,
    pub asset: RemoteAsset,
    pub record: VideoRecord,
    /// Id the backend answered with.
    pub record_id: String,
    /// Chunk requests issued, retries included.
    pub chunk_requests: u32,
    pub retries: u32,
}

/// Event emitted while uploads run.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Phase {
        upload_id: String,
        phase: UploadPhase,
    },
    /// Emitted after every confirmed advance.
    Progress(UploadProgress),
    /// A fault is being retried after `delay`.
    Retrying {
        upload_id: String,
        offset: u64,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    Completed {
        upload_id: String,
        video_url: String,
        record_id: String,
    },
    Failed {
        upload_id: String,
        error: String,
    },
}

impl UploadEvent {
    pub fn upload_id(&self) -> &str {
        match self {
            Self::Phase { upload_id, .. }
            | Self::Retrying { upload_id, .. }
            | Self::Completed { upload_id, .. }
            | Self::Failed { upload_id, .. } => upload_id,
            Self::Progress(p) => &p.upload_id,
        }
    }
}

/// Per-file result from the orchestrator.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub upload_id: String,
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
    /// User-facing failure text.
    pub user_message: Option<String>,
    pub video_url: Option<String>,
    pub record_id: Option<String>,
}
