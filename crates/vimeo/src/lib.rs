//! Vimeo API client for resumable video uploads.
//!
//! Covers the slice of the [Vimeo](https://developer.vimeo.com) API v3.4
//! needed to push a local file with the tus approach: create the video
//! with an upload ticket, PATCH byte ranges to the upload link, query the
//! confirmed offset, and delete the video.

pub mod client;
pub mod types;

pub use client::{Client, Error, HostCredentials};
pub use types::{CreateVideoResponse, TusOffset, UploadTicket, VideoMetadata};
