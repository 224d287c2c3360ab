//! Upload error types.

use moments_transfer::TransferError;

use crate::types::RemoteAsset;

/// Failure reported by a [`VideoHost`](crate::VideoHost) or
/// [`RecordStore`](crate::RecordStore) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network fault, timeout or 5xx. Repeating the call may succeed.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The host holds a different offset than the request declared.
    #[error("upload offset conflict")]
    OffsetConflict,

    /// Definitive refusal (4xx other than an offset conflict).
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Response did not match the expected schema.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::OffsetConflict)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::OffsetConflict => Some(409),
            _ => None,
        }
    }
}

impl From<moments_vimeo::Error> for RemoteError {
    fn from(e: moments_vimeo::Error) -> Self {
        use moments_vimeo::Error;

        if matches!(e, Error::Conflict) {
            return Self::OffsetConflict;
        }
        if e.is_retryable() {
            return Self::Transient(e.to_string());
        }
        match e {
            Error::Api { status, body } => Self::Rejected {
                status,
                message: body,
            },
            Error::InvalidKey => Self::Rejected {
                status: 401,
                message: "invalid access token".into(),
            },
            Error::Http(ref h) => match h.status() {
                Some(status) => Self::Rejected {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => Self::Malformed(e.to_string()),
            },
            other => Self::Malformed(other.to_string()),
        }
    }
}

impl From<moments_backend::Error> for RemoteError {
    fn from(e: moments_backend::Error) -> Self {
        use moments_backend::Error;

        if e.is_retryable() {
            return Self::Transient(e.to_string());
        }
        match e {
            Error::Api { status, message } => Self::Rejected { status, message },
            other => match other.status() {
                Some(status) => Self::Rejected {
                    status,
                    message: other.to_string(),
                },
                None => Self::Malformed(other.to_string()),
            },
        }
    }
}

/// Why the chunk loop stopped before the host confirmed every byte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferFault {
    /// Non-retryable refusal of a chunk.
    #[error("host rejected chunk at offset {offset} with status {status}: {message}")]
    Rejected {
        offset: u64,
        status: u16,
        message: String,
    },

    /// The host kept answering without moving the offset.
    #[error("no progress at offset {offset} after {attempts} attempts")]
    Stalled { offset: u64, attempts: u32 },

    /// Retryable faults (network, timeout, 5xx) hit the attempt cap.
    #[error("gave up at offset {offset} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        offset: u64,
        attempts: u32,
        last_error: String,
    },

    /// The host answered with something the protocol does not allow
    /// (offset moved backwards, past the end, missing or garbled header).
    #[error("protocol violation at offset {offset}: {detail}")]
    Protocol { offset: u64, detail: String },
}

impl TransferFault {
    /// Last offset the host confirmed before the fault.
    pub fn offset(&self) -> u64 {
        match self {
            Self::Rejected { offset, .. }
            | Self::Stalled { offset, .. }
            | Self::RetriesExhausted { offset, .. }
            | Self::Protocol { offset, .. } => *offset,
        }
    }

    /// Whether the fault came from retryable conditions that ran out of
    /// attempts, as opposed to a definitive refusal.
    pub fn was_retryable(&self) -> bool {
        matches!(self, Self::Stalled { .. } | Self::RetriesExhausted { .. })
    }
}

/// Errors produced by the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Local file missing, unreadable, empty, or changed under us.
    #[error("local media error: {0}")]
    Io(#[from] TransferError),

    /// The host refused to open an upload session.
    #[error("session negotiation failed: {0}")]
    Session(RemoteError),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferFault),

    /// Required metadata missing; raised before any network call.
    #[error("invalid upload metadata: {0}")]
    Validation(String),

    /// The backend refused the record. `orphan` is the asset left on the
    /// host, if it was not deleted.
    #[error("registration failed: {message}")]
    Registration {
        message: String,
        status: Option<u16>,
        orphan: Option<RemoteAsset>,
    },

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Short message suitable for an alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(_) => "The video file could not be read.".into(),
            Self::Session(RemoteError::Rejected { status: 401, .. })
            | Self::Session(RemoteError::Rejected { status: 403, .. }) => {
                "The video service rejected our credentials.".into()
            }
            Self::Session(_) => "Could not start the upload. Please try again.".into(),
            Self::Transfer(fault) if fault.was_retryable() => {
                "The upload was interrupted by network problems. Please try again.".into()
            }
            Self::Transfer(_) => "The video service refused the upload.".into(),
            Self::Validation(msg) => format!("Missing information: {msg}."),
            Self::Registration { .. } => {
                "Your video was uploaded but could not be saved to your profile.".into()
            }
            Self::Cancelled => "Upload cancelled.".into(),
        }
    }
}
