//! Opens an upload session on the video host.

use moments_transfer::LocalMediaHandle;
use tracing::{debug, warn};

use crate::error::{RemoteError, UploadError};
use crate::remote::VideoHost;
use crate::types::{DisplayMetadata, UploadSession};

/// Requests an upload session sized to the media.
pub struct Negotiator<'a> {
    host: &'a dyn VideoHost,
}

impl<'a> Negotiator<'a> {
    pub fn new(host: &'a dyn VideoHost) -> Self {
        Self { host }
    }

    /// Opens a session for `media`.
    ///
    /// Any refusal surfaces as [`UploadError::Session`]; no chunk has been
    /// sent at that point.
    pub async fn negotiate(
        &self,
        media: &LocalMediaHandle,
        metadata: &DisplayMetadata,
    ) -> Result<UploadSession, UploadError> {
        let total_size = media.size_bytes();
        if total_size == 0 {
            return Err(UploadError::Validation("media is empty".into()));
        }

        let session = self
            .host
            .create_session(total_size, metadata)
            .await
            .map_err(|e| {
                warn!(size = total_size, error = %e, "upload session refused");
                UploadError::Session(e)
            })?;

        if session.upload_endpoint.trim().is_empty() {
            return Err(UploadError::Session(RemoteError::Malformed(
                "session has no upload endpoint".into(),
            )));
        }
        if session.total_size != total_size {
            return Err(UploadError::Session(RemoteError::Malformed(format!(
                "session sized {} bytes, media is {total_size}",
                session.total_size
            ))));
        }

        debug!(
            resource = %session.resource_id,
            size = total_size,
            "upload session negotiated"
        );
        Ok(session)
    }
}
