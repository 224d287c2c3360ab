//! Request and response schemas for the Vimeo upload endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moments_protocol::tus::APPROACH_TUS;

/// Display metadata attached to the video when it is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub name: String,
    pub description: String,
    /// Vimeo privacy view setting (`anybody`, `nobody`, `unlisted`, ...).
    /// Empty leaves the account default.
    pub privacy_view: String,
}

/// Body of `POST /me/videos` (internal).
#[derive(Debug, Serialize)]
pub(crate) struct CreateVideoRequest<'a> {
    pub upload: UploadRequest<'a>,
    #[serde(skip_serializing_if = "is_blank")]
    pub name: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy<'a>>,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadRequest<'a> {
    pub approach: &'a str,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Privacy<'a> {
    pub view: &'a str,
}

impl<'a> CreateVideoRequest<'a> {
    pub(crate) fn tus(size: u64, meta: &'a VideoMetadata) -> Self {
        Self {
            upload: UploadRequest {
                approach: APPROACH_TUS,
                size,
            },
            name: &meta.name,
            description: &meta.description,
            privacy: (!meta.privacy_view.is_empty()).then_some(Privacy {
                view: &meta.privacy_view,
            }),
        }
    }
}

/// Upload ticket inside a create-video response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTicket {
    /// URL the chunks are PATCHed to.
    pub upload_link: String,
    #[serde(default)]
    pub approach: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Response of `POST /me/videos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVideoResponse {
    /// API path of the video, e.g. `/videos/123456`.
    pub uri: String,
    /// Public playback page.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<String>,
    pub upload: UploadTicket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
}

/// Offset state reported by a tus HEAD request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TusOffset {
    pub offset: u64,
    pub length: Option<u64>,
}
