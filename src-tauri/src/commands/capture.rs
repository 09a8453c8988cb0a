use crate::commands::bridge::TauriBridge;
use crate::models::view_state::ViewState;
use crate::services::controller::ControllerHandle;
use crate::utils::image_data::decode_base64_payload;
use std::sync::Arc;
use tauri::State;

/// State wrapper for the platform bridge
pub type BridgeState = Arc<TauriBridge>;

// ============================================================
// User actions
// ============================================================

/// Capture button: request camera permission, then take a photo
#[tauri::command]
pub fn capture_from_camera(controller: State<'_, ControllerHandle>) -> Result<(), String> {
    controller.capture_from_camera()
}

/// Gallery button: pick an existing image
#[tauri::command]
pub fn pick_from_gallery(controller: State<'_, ControllerHandle>) -> Result<(), String> {
    controller.pick_from_gallery()
}

/// Copy button: put the recognized text on the clipboard
#[tauri::command]
pub async fn copy_recognized_text(controller: State<'_, ControllerHandle>) -> Result<String, String> {
    controller.copy_recognized_text().await
}

/// Current view, for a frontend that (re)attaches mid-session
#[tauri::command]
pub async fn get_view_state(controller: State<'_, ControllerHandle>) -> Result<ViewState, String> {
    controller.view_state().await
}

// ============================================================
// Platform completions
// ============================================================

#[tauri::command]
pub fn answer_camera_permission(
    bridge: State<'_, BridgeState>,
    request_id: u64,
    granted: bool,
) -> Result<(), String> {
    bridge.requests().answer_camera_permission(request_id, granted)
}

/// Camera finished; `photo_base64` is absent when the user cancelled
#[tauri::command]
pub fn complete_camera_capture(
    bridge: State<'_, BridgeState>,
    request_id: u64,
    photo_base64: Option<String>,
) -> Result<(), String> {
    let requests = bridge.requests();
    match photo_base64.map(|data| decode_base64_payload(&data)).transpose() {
        Ok(photo) => requests.complete_camera_capture(request_id, photo),
        Err(e) => {
            requests.fail_camera_capture(request_id, e.clone())?;
            Err(e)
        }
    }
}

/// Gallery picker finished; `image_base64` is absent when nothing was picked
#[tauri::command]
pub fn complete_gallery_pick(
    bridge: State<'_, BridgeState>,
    request_id: u64,
    image_base64: Option<String>,
) -> Result<(), String> {
    let requests = bridge.requests();
    match image_base64.map(|data| decode_base64_payload(&data)).transpose() {
        Ok(image) => requests.complete_gallery_pick(request_id, image),
        Err(e) => {
            requests.fail_gallery_pick(request_id, e.clone())?;
            Err(e)
        }
    }
}
