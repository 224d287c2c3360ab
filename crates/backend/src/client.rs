//! Backend HTTP client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use moments_protocol::{CreateVideoResponse, VideoRecord, VideoSummary};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the backend client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Json(_) => None,
        }
    }

    /// Transport faults and 5xx may succeed when repeated; 4xx will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Json(_) => false,
        }
    }
}

/// `{"message": "..."}` error body the backend sends with 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// moments backend client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the backend at `base_url` (e.g. `http://host:3000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Persists a video record (`POST /api/videos`).
    pub async fn create_video(&self, record: &VideoRecord) -> Result<CreateVideoResponse, Error> {
        let url = format!("{}/api/videos", self.base_url);
        let resp = self.http.post(&url).json(record).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        let created: CreateVideoResponse = serde_json::from_slice(&bytes)?;
        debug!(video_id = %created.video_id, "video record created");
        Ok(created)
    }

    /// Lists all registered videos (`GET /api/videos`).
    ///
    /// The backend answers 404 when the collection is empty; that is
    /// reported as an empty list.
    pub async fn list_videos(&self) -> Result<Vec<VideoSummary>, Error> {
        let url = format!("{}/api/videos", self.base_url);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    Error::Api {
        status: status.as_u16(),
        message,
    }
}
