//! Resumable upload (tus 1.0.0) header names and values.

/// Protocol version sent with every tus request.
pub const TUS_VERSION: &str = "1.0.0";

/// Header carrying the protocol version.
pub const TUS_RESUMABLE: &str = "Tus-Resumable";

/// Header carrying the byte offset, in requests and responses.
pub const UPLOAD_OFFSET: &str = "Upload-Offset";

/// Header carrying the declared total length in HEAD responses.
pub const UPLOAD_LENGTH: &str = "Upload-Length";

/// Content type of a PATCH body.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Upload approach requested when creating a session.
pub const APPROACH_TUS: &str = "tus";

/// Parses an offset header value.
///
/// Offsets are unsigned decimal byte counts; anything else is rejected.
pub fn parse_offset(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}
