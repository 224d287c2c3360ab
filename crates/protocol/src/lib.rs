//! Wire types for moments video uploads.
//!
//! Shared by the host client, the backend client and the upload pipeline.

pub mod tus;
pub mod types;

pub use types::{
    Comment, CreateVideoResponse, UploadPhase, UploadProgress, VideoRecord, VideoSummary,
};
