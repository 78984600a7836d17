use thiserror::Error;

/// Failures surfaced by the note store, the session and the auth gateway.
///
/// Every variant carries a message meant for logs; `Auth` messages are also
/// safe to show to the user as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NoteError {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("image upload failed after {count} of the images were stored: {message}", count = .uploaded.len())]
    PartialUploadFailure {
        uploaded: Vec<String>,
        message: String,
    },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Auth(String),
}

impl NoteError {
    /// Stable code for callers that branch on the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable(_) => "REMOTE_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PartialUploadFailure { .. } => "PARTIAL_UPLOAD_FAILURE",
            Self::InvalidDocument(_) => "INVALID_DOCUMENT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Auth(_) => "AUTH",
        }
    }
}

impl From<opendal::Error> for NoteError {
    fn from(value: opendal::Error) -> Self {
        match value.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound(value.to_string()),
            _ => Self::RemoteUnavailable(value.to_string()),
        }
    }
}

impl From<serde_json::Error> for NoteError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidDocument(value.to_string())
    }
}

pub type NoteResult<T> = Result<T, NoteError>;
