use crate::models::capture::ImagePreview;
use serde::{Deserialize, Serialize};

/// Position in the capture cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    PermissionRequested,
    Capturing,
    Decoding,
    Recognizing,
    ResultShown,
    ErrorShown,
}

impl Phase {
    /// Whether the cycle has finished and the next user action starts fresh
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::ResultShown | Self::ErrorShown)
    }
}

/// Snapshot of everything the UI currently shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewState {
    pub phase: Phase,
    pub image: Option<ImagePreview>,
    pub result_text: Option<String>,
    pub copy_visible: bool,
}

/// Incremental UI change pushed to the presenter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum UiUpdate {
    Phase(Phase),
    Image(ImagePreview),
    ResultText(String),
    CopyVisible(bool),
    /// Transient, non-blocking message
    Notice(String),
}
