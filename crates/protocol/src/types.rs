use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub user_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Video document accepted by `POST /api/videos`.
///
/// Field names are the backend's storage names (snake_case).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub user_id: String,
    pub video_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub is_public: bool,
    pub upload_time: DateTime<Utc>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Body returned by `POST /api/videos` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoResponse {
    #[serde(default)]
    pub message: String,
    pub video_id: String,
}

/// One entry of `GET /api/videos`.
///
/// The listing endpoint reformats records to camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub video_id: String,
    pub user_id: String,
    pub video_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: u64,
}

/// Lifecycle of a single video upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Idle,
    Negotiating,
    Transferring,
    /// All bytes confirmed by the host.
    Completed,
    /// Backend record created for the uploaded asset.
    Registered,
    Failed,
    Cancelled,
}

impl UploadPhase {
    /// Returns `true` once no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Registered | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Negotiating => "negotiating",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Registered => "registered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Progress snapshot for an active upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: String,
    pub phase: UploadPhase,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    #[serde(default)]
    pub bytes_per_second: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.uploaded_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}
