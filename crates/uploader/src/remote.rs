//! Seams to the video host and the backend.
//!
//! The pipeline only talks to these traits. The real implementations below
//! bridge to `moments_vimeo::Client` and `moments_backend::Client`; tests
//! swap in mocks.

use std::future::Future;
use std::pin::Pin;

use moments_protocol::VideoRecord;
use moments_vimeo::VideoMetadata;
use tracing::debug;

use crate::error::RemoteError;
use crate::types::{DisplayMetadata, RemoteAsset, UploadSession};

/// Boxed future returned by the remote traits.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Resumable video host.
pub trait VideoHost: Send + Sync {
    /// Opens an upload session for `total_size` bytes.
    fn create_session(
        &self,
        total_size: u64,
        metadata: &DisplayMetadata,
    ) -> RemoteFuture<'_, UploadSession>;

    /// Sends `data` at `offset` and returns the offset the host now holds.
    fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'_, u64>;

    /// Asks the host how many bytes of the session it holds.
    fn current_offset(&self, session: &UploadSession) -> RemoteFuture<'_, u64>;

    /// Removes an asset from the host.
    fn delete_asset(&self, asset: &RemoteAsset) -> RemoteFuture<'_, ()>;
}

/// Backend that persists video records.
pub trait RecordStore: Send + Sync {
    /// Persists `record` and returns the id the backend reports.
    fn create_record(&self, record: &VideoRecord) -> RemoteFuture<'_, String>;
}

impl VideoHost for moments_vimeo::Client {
    fn create_session(
        &self,
        total_size: u64,
        metadata: &DisplayMetadata,
    ) -> RemoteFuture<'_, UploadSession> {
        let meta = VideoMetadata {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            privacy_view: metadata.privacy_view.clone(),
        };
        Box::pin(async move {
            let created = self.create_upload(total_size, &meta).await?;
            match created.upload.size {
                Some(size) if size != total_size => {
                    return Err(RemoteError::Malformed(format!(
                        "host opened session for {size} bytes, requested {total_size}"
                    )));
                }
                _ => {}
            }
            debug!(uri = %created.uri, "upload session opened");
            Ok(UploadSession {
                upload_endpoint: created.upload.upload_link,
                resource_id: created.uri,
                total_size,
                playback_url: created.link,
                created_time: created.created_time,
            })
        })
    }

    fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'_, u64> {
        let link = session.upload_endpoint.clone();
        Box::pin(async move { Ok(self.patch_chunk(&link, offset, data).await?) })
    }

    fn current_offset(&self, session: &UploadSession) -> RemoteFuture<'_, u64> {
        let link = session.upload_endpoint.clone();
        Box::pin(async move { Ok(self.upload_offset(&link).await?.offset) })
    }

    fn delete_asset(&self, asset: &RemoteAsset) -> RemoteFuture<'_, ()> {
        let uri = asset.asset_id.clone();
        Box::pin(async move { Ok(self.delete_video(&uri).await?) })
    }
}

impl RecordStore for moments_backend::Client {
    fn create_record(&self, record: &VideoRecord) -> RemoteFuture<'_, String> {
        let record = record.clone();
        Box::pin(async move { Ok(self.create_video(&record).await?.video_id) })
    }
}
