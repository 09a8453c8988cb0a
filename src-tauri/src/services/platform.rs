use crate::error::{CaptureError, CaptureResult};
use crate::models::capture::ContentRef;
use crate::models::view_state::UiUpdate;
use crate::services::storage::ShareGrant;
use tokio::sync::oneshot;

/// Completion of an external, asynchronous facility
///
/// A dropped sender means the facility went away without answering.
pub type Completion<T> = oneshot::Receiver<T>;

/// MIME filter used for the gallery picker
pub const IMAGE_MIME: &str = "image/*";

/// OS permission dialog for the camera
pub trait PermissionGate: Send + Sync {
    fn request_camera_permission(&self) -> Completion<bool>;
}

/// How a camera launch ended
#[derive(Debug, Clone, PartialEq)]
pub enum CameraOutcome {
    /// A photo was written through the share grant
    Written,
    /// The user backed out without taking a photo
    Cancelled,
    /// A photo was taken but could not be stored
    Failed(CaptureError),
}

/// External camera activity that writes one photo into a shared file
pub trait CameraLauncher: Send + Sync {
    fn take_picture(&self, target: &ShareGrant) -> Completion<CameraOutcome>;
}

/// `Ok(None)` when the user picked nothing
pub type GallerySelection = CaptureResult<Option<ContentRef>>;

/// Permission-less content picker
pub trait GalleryPicker: Send + Sync {
    fn pick_image(&self, mime: &str) -> Completion<GallerySelection>;
}

/// System clipboard
pub trait Clipboard: Send + Sync {
    fn set_plain_text(&self, label: &str, text: &str) -> Result<(), String>;
}

/// Widget layer that renders controller updates
pub trait Presenter: Send + Sync {
    fn apply(&self, update: UiUpdate);
}

/// Completion that has already resolved
pub fn ready<T>(value: T) -> Completion<T> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(value);
    rx
}
