use thiserror::Error;

/// Failures along the capture → recognize → copy flow
///
/// `Display` is the notice shown to the user.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Error while creating file: {0}")]
    FileCreationFailed(String),

    #[error("Failed to load image: {0}")]
    ImageDecodeFailed(String),

    #[error("No image selected")]
    NoSelectionMade,

    #[error("Failed to recognize text: {0}")]
    RecognitionFailed(String),

    #[error("Share grant expired or unknown: {0}")]
    ShareGrantExpired(String),

    #[error("Unknown content reference: {0}")]
    UnknownContent(String),

    #[error("Failed to copy text: {0}")]
    ClipboardFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
