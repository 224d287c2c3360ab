//! Resumable video upload pipeline.
//!
//! Takes a local video to a registered, playable asset:
//!
//! 1. **Negotiate**: open an upload session on the video host for the
//!    file's total size
//! 2. **Transfer**: PATCH the file in bounded chunks, trusting the
//!    host-confirmed offset, with bounded retry and backoff
//! 3. **Register**: create the backend video record pointing at the
//!    host's playback URL
//!
//! The host and the backend sit behind the [`VideoHost`] and
//! [`RecordStore`] traits so the pipeline runs against mocks in tests.
//! Implementations over the real clients live in [`remote`].

pub mod engine;
pub mod error;
pub mod finalizer;
pub mod negotiator;
pub mod orchestrator;
pub mod pipeline;
pub mod remote;
pub mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{TransferEngine, TransferOutcome};
pub use error::{RemoteError, TransferFault, UploadError};
pub use finalizer::{Finalizer, ORPHAN_DELETE_TIMEOUT, Registration};
pub use negotiator::Negotiator;
pub use orchestrator::UploadOrchestrator;
pub use pipeline::UploadPipeline;
pub use remote::{RecordStore, RemoteFuture, VideoHost};
pub use retry::RetryPolicy;
pub use types::{
    DisplayMetadata, OrphanPolicy, RecordMetadata, RemoteAsset, UploadEvent, UploadOptions,
    UploadOutcome, UploadReport, UploadRequest, UploadSession,
};
