//! Vimeo API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Chunk transfer speaks tus 1.0.0 against the upload link handed out at
//! video creation. The token is only sent to the API base URL, never to
//! upload links.

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use tracing::debug;

use moments_protocol::tus::{
    self, APPROACH_TUS, OFFSET_OCTET_STREAM, TUS_RESUMABLE, TUS_VERSION, UPLOAD_LENGTH,
    UPLOAD_OFFSET,
};

use crate::types::{CreateVideoRequest, CreateVideoResponse, TusOffset, VideoMetadata};

const DEFAULT_BASE_URL: &str = "https://api.vimeo.com";
const API_VERSION_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";
/// Bound on API calls. Chunk transfers are bounded by the caller.
const API_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the Vimeo client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid access token")]
    InvalidKey,

    #[error("response missing {0} header")]
    MissingHeader(&'static str),

    #[error("invalid {name} header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The upload link rejected the PATCH because its offset differs from
    /// ours (HTTP 409).
    #[error("upload offset conflict")]
    Conflict,
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Conflict => Some(StatusCode::CONFLICT.as_u16()),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Transport faults, timeouts, 408, 429 and 5xx are retryable. Other
    /// 4xx and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Conflict => true,
            _ => false,
        }
    }
}

/// Access token for the Vimeo API.
///
/// Passed explicitly to [`Client::new`]; never stored globally.
#[derive(Clone)]
pub struct HostCredentials {
    access_token: String,
}

impl HostCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    fn bearer(&self) -> Result<HeaderValue, Error> {
        if self.is_empty() {
            return Err(Error::InvalidKey);
        }
        let mut value = HeaderValue::from_str(&format!("bearer {}", self.access_token))
            .map_err(|_| Error::InvalidKey)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for HostCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCredentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Vimeo API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    bearer: HeaderValue,
    base_url: String,
}

impl Client {
    /// Creates a new client authenticated with `credentials`.
    pub fn new(credentials: &HostCredentials) -> Result<Self, Error> {
        let bearer = credentials.bearer()?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            bearer,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Authenticated request against the API.
    fn api(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http
            .request(method, url)
            .header(AUTHORIZATION, self.bearer.clone())
            .header(ACCEPT, API_VERSION_ACCEPT)
            .timeout(API_TIMEOUT)
    }

    /// Sets a custom API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a video and opens a tus upload ticket for `size` bytes.
    pub async fn create_upload(
        &self,
        size: u64,
        meta: &VideoMetadata,
    ) -> Result<CreateVideoResponse, Error> {
        let body = CreateVideoRequest::tus(size, meta);

        let resp = self.api(Method::POST, "me/videos").json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let created: CreateVideoResponse = serde_json::from_slice(&bytes)?;

        if created.upload.upload_link.trim().is_empty() {
            return Err(Error::UnexpectedResponse("empty upload_link".into()));
        }
        if !created.upload.approach.is_empty() && created.upload.approach != APPROACH_TUS {
            return Err(Error::UnexpectedResponse(format!(
                "upload approach {:?}, expected {APPROACH_TUS:?}",
                created.upload.approach
            )));
        }

        debug!(uri = %created.uri, size, "upload ticket created");
        Ok(created)
    }

    /// Sends `data` to `upload_link` starting at `offset`.
    ///
    /// Returns the offset the host reports after the write, which may be
    /// less than `offset + data.len()` if the host persisted only part of
    /// the body.
    pub async fn patch_chunk(
        &self,
        upload_link: &str,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<u64, Error> {
        let len = data.len();
        let resp = self
            .http
            .patch(upload_link)
            .header(TUS_RESUMABLE, TUS_VERSION)
            .header(UPLOAD_OFFSET, offset.to_string())
            .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .body(data)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Err(Error::Conflict);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let confirmed = read_offset_header(resp.headers(), UPLOAD_OFFSET)?
            .ok_or(Error::MissingHeader(UPLOAD_OFFSET))?;
        debug!(offset, len, confirmed, "chunk accepted");
        Ok(confirmed)
    }

    /// Asks the upload link how many bytes it holds (tus HEAD).
    pub async fn upload_offset(&self, upload_link: &str) -> Result<TusOffset, Error> {
        let resp = self
            .http
            .head(upload_link)
            .header(TUS_RESUMABLE, TUS_VERSION)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let offset = read_offset_header(resp.headers(), UPLOAD_OFFSET)?
            .ok_or(Error::MissingHeader(UPLOAD_OFFSET))?;
        let length = read_offset_header(resp.headers(), UPLOAD_LENGTH)?;
        Ok(TusOffset { offset, length })
    }

    /// Deletes a video by its API path (e.g. `/videos/123`).
    pub async fn delete_video(&self, uri: &str) -> Result<(), Error> {
        let resp = self.api(Method::DELETE, uri).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        debug!(uri, "video deleted");
        Ok(())
    }
}

/// Reads an optional numeric tus header.
fn read_offset_header(headers: &HeaderMap, name: &'static str) -> Result<Option<u64>, Error> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };
    let value = raw.to_str().unwrap_or_default();
    tus::parse_offset(value)
        .map(Some)
        .ok_or_else(|| Error::InvalidHeader {
            name,
            value: value.to_string(),
        })
}
