use crate::error::CaptureError;
use crate::models::capture::ContentRef;
use crate::models::view_state::UiUpdate;
use crate::services::acquisition::{ContentResolver, PickedContentStore};
use crate::services::platform::{
    CameraLauncher, CameraOutcome, Completion, GalleryPicker, GallerySelection, PermissionGate,
    Presenter,
};
use crate::services::storage::{FileProvider, ShareGrant};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tauri::{AppHandle, Emitter};
use tokio::sync::oneshot;

pub const UPDATE_EVENT: &str = "ocr:update";
pub const PERMISSION_EVENT: &str = "permission:camera-request";
pub const CAMERA_EVENT: &str = "camera:launch";
pub const GALLERY_EVENT: &str = "gallery:pick";
#[cfg(mobile)]
pub const CLIPBOARD_EVENT: &str = "clipboard:write";

/// Requests waiting for the frontend to answer, keyed by id
pub struct PendingRequests<T> {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<u64, oneshot::Sender<T>>>,
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiting: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingRequests<T> {
    /// Open a request, dropping earlier ones nobody awaits any more
    pub fn open(&self) -> (u64, Completion<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut waiting = self.waiting.lock();
        waiting.retain(|_, tx| !tx.is_closed());
        waiting.insert(id, tx);
        (id, rx)
    }

    /// Answer request `id`; each id can be answered once
    ///
    /// On failure the value is handed back so the caller can clean it up.
    pub fn resolve(&self, id: u64, value: T) -> Result<(), (String, T)> {
        let Some(tx) = self.waiting.lock().remove(&id) else {
            return Err((format!("Unknown or already answered request: {}", id), value));
        };

        tx.send(value)
            .map_err(|value| (format!("Request {} is no longer awaited", id), value))
    }

    pub fn is_open(&self, id: u64) -> bool {
        self.waiting.lock().contains_key(&id)
    }

    /// Drop request `id` unanswered
    pub fn abandon(&self, id: u64) {
        self.waiting.lock().remove(&id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.waiting.lock().len()
    }
}

/// Bookkeeping behind the webview round-trips
///
/// Tracks which request ids are open and turns the frontend's answers into
/// completions. Emitting the requests is left to [`TauriBridge`].
pub struct RequestBook {
    provider: Arc<FileProvider>,
    picked: Arc<PickedContentStore>,
    permissions: PendingRequests<bool>,
    camera: PendingRequests<CameraOutcome>,
    camera_targets: Mutex<HashMap<u64, ContentRef>>,
    gallery: PendingRequests<GallerySelection>,
}

impl RequestBook {
    pub fn new(provider: Arc<FileProvider>, picked: Arc<PickedContentStore>) -> Self {
        Self {
            provider,
            picked,
            permissions: PendingRequests::default(),
            camera: PendingRequests::default(),
            camera_targets: Mutex::new(HashMap::new()),
            gallery: PendingRequests::default(),
        }
    }

    pub fn open_permission(&self) -> (u64, Completion<bool>) {
        self.permissions.open()
    }

    pub fn open_camera(&self, target: &ContentRef) -> (u64, Completion<CameraOutcome>) {
        let (id, rx) = self.camera.open();
        let mut targets = self.camera_targets.lock();
        targets.retain(|open_id, _| self.camera.is_open(*open_id));
        targets.insert(id, target.clone());
        (id, rx)
    }

    pub fn open_gallery(&self) -> (u64, Completion<GallerySelection>) {
        self.gallery.open()
    }

    pub fn abandon_permission(&self, id: u64) {
        self.permissions.abandon(id);
    }

    pub fn abandon_camera(&self, id: u64) {
        self.camera.abandon(id);
        self.camera_targets.lock().remove(&id);
    }

    pub fn abandon_gallery(&self, id: u64) {
        self.gallery.abandon(id);
    }

    pub fn answer_camera_permission(&self, request_id: u64, granted: bool) -> Result<(), String> {
        tracing::debug!(request_id, granted, "camera permission answered");
        self.permissions.resolve(request_id, granted).map_err(|(e, _)| e)
    }

    /// Store the shot through the share grant, then report the outcome
    ///
    /// `None` means the user cancelled.
    pub fn complete_camera_capture(&self, request_id: u64, photo: Option<Vec<u8>>) -> Result<(), String> {
        let target = self
            .camera_targets
            .lock()
            .remove(&request_id)
            .ok_or_else(|| format!("Unknown or already answered request: {}", request_id))?;

        let Some(photo) = photo else {
            return self.camera.resolve(request_id, CameraOutcome::Cancelled).map_err(|(e, _)| e);
        };

        match self.provider.write(&target, &photo) {
            Ok(()) => self.camera.resolve(request_id, CameraOutcome::Written).map_err(|(e, _)| e),
            Err(e) => {
                let message = e.to_string();
                self.camera.resolve(request_id, CameraOutcome::Failed(e)).ok();
                Err(message)
            }
        }
    }

    /// The camera produced something that could not be read
    pub fn fail_camera_capture(&self, request_id: u64, reason: String) -> Result<(), String> {
        self.camera_targets
            .lock()
            .remove(&request_id)
            .ok_or_else(|| format!("Unknown or already answered request: {}", request_id))?;

        self.camera
            .resolve(request_id, CameraOutcome::Failed(CaptureError::ImageDecodeFailed(reason)))
            .map_err(|(e, _)| e)
    }

    /// Register the picked bytes and hand their reference over
    ///
    /// `None` means nothing was picked.
    pub fn complete_gallery_pick(&self, request_id: u64, image: Option<Vec<u8>>) -> Result<(), String> {
        let selection = image.map(|data| self.picked.register(data));

        self.gallery.resolve(request_id, Ok(selection)).map_err(|(e, unclaimed)| {
            if let Ok(Some(content)) = unclaimed {
                self.picked.release(&content);
            }
            e
        })
    }

    /// The pick could not be read; `reason` goes to the user
    pub fn fail_gallery_pick(&self, request_id: u64, reason: String) -> Result<(), String> {
        self.gallery
            .resolve(request_id, Err(CaptureError::ImageDecodeFailed(reason)))
            .map_err(|(e, _)| e)
    }
}

#[derive(Clone, Serialize)]
struct PermissionRequest {
    request_id: u64,
    permission: &'static str,
}

#[derive(Clone, Serialize)]
struct CameraLaunch {
    request_id: u64,
    target: ContentRef,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Serialize)]
struct GalleryPick {
    request_id: u64,
    mime: String,
}

/// Platform facilities implemented by round-trips to the webview
///
/// Each request is emitted as an event carrying a request id; the frontend
/// answers through the matching `complete_*` / `answer_*` command.
pub struct TauriBridge {
    app: AppHandle,
    requests: RequestBook,
}

impl TauriBridge {
    pub fn new(app: AppHandle, provider: Arc<FileProvider>, picked: Arc<PickedContentStore>) -> Self {
        Self {
            app,
            requests: RequestBook::new(provider, picked),
        }
    }

    pub fn requests(&self) -> &RequestBook {
        &self.requests
    }

    /// Emit a request; `false` if the webview could not be reached
    fn emit_request<P: Serialize + Clone>(&self, event: &str, payload: P) -> bool {
        match self.app.emit(event, payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(event, error = %e, "failed to emit request");
                false
            }
        }
    }
}

impl PermissionGate for TauriBridge {
    fn request_camera_permission(&self) -> Completion<bool> {
        let (request_id, rx) = self.requests.open_permission();
        let request = PermissionRequest {
            request_id,
            permission: "camera",
        };
        if !self.emit_request(PERMISSION_EVENT, request) {
            self.requests.abandon_permission(request_id);
        }
        rx
    }
}

impl CameraLauncher for TauriBridge {
    fn take_picture(&self, target: &ShareGrant) -> Completion<CameraOutcome> {
        let (request_id, rx) = self.requests.open_camera(&target.uri);
        let launch = CameraLaunch {
            request_id,
            target: target.uri.clone(),
            expires_at: target.expires_at,
        };
        if !self.emit_request(CAMERA_EVENT, launch) {
            self.requests.abandon_camera(request_id);
        }
        rx
    }
}

impl GalleryPicker for TauriBridge {
    fn pick_image(&self, mime: &str) -> Completion<GallerySelection> {
        let (request_id, rx) = self.requests.open_gallery();
        let pick = GalleryPick {
            request_id,
            mime: mime.to_string(),
        };
        if !self.emit_request(GALLERY_EVENT, pick) {
            self.requests.abandon_gallery(request_id);
        }
        rx
    }
}

impl Presenter for TauriBridge {
    fn apply(&self, update: UiUpdate) {
        if let Err(e) = self.app.emit(UPDATE_EVENT, &update) {
            tracing::error!(error = %e, ?update, "failed to emit UI update");
        }
    }
}

#[cfg(mobile)]
impl crate::services::platform::Clipboard for TauriBridge {
    fn set_plain_text(&self, label: &str, text: &str) -> Result<(), String> {
        #[derive(Clone, Serialize)]
        struct ClipboardWrite<'a> {
            label: &'a str,
            text: &'a str,
        }

        self.app
            .emit(CLIPBOARD_EVENT, ClipboardWrite { label, text })
            .map_err(|e| format!("Failed to copy to clipboard: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::PictureStore;
    use std::io::Read;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_pending_request_resolves_once() {
        let pending = PendingRequests::<bool>::default();
        let (id, rx) = pending.open();
        assert_eq!(pending.len(), 1);

        assert_ok!(pending.resolve(id, true));
        assert_eq!(rx.await.unwrap(), true);
        assert_eq!(pending.len(), 0);

        let (err, _) = pending.resolve(id, false).unwrap_err();
        assert!(err.contains("already answered"));
    }

    #[tokio::test]
    async fn test_abandoned_request_closes_completion() {
        let pending = PendingRequests::<Option<ContentRef>>::default();
        let (id, rx) = pending.open();

        pending.abandon(id);
        assert!(rx.await.is_err());
        assert!(pending.resolve(id, None).is_err());
    }

    #[test]
    fn test_request_ids_are_distinct() {
        let pending = PendingRequests::<bool>::default();
        let (first, _rx1) = pending.open();
        let (second, _rx2) = pending.open();

        assert_ne!(first, second);
    }

    #[test]
    fn test_resolving_dropped_receiver_hands_value_back() {
        let pending = PendingRequests::<u32>::default();
        let (id, rx) = pending.open();
        drop(rx);

        let (err, value) = pending.resolve(id, 7).unwrap_err();
        assert!(err.contains("no longer awaited"));
        assert_eq!(value, 7);
    }

    #[test]
    fn test_open_sweeps_requests_nobody_awaits() {
        let pending = PendingRequests::<bool>::default();
        let (stale, rx) = pending.open();
        drop(rx);

        let (_fresh, _rx) = pending.open();
        assert_eq!(pending.len(), 1);
        assert!(!pending.is_open(stale));
    }

    struct Book {
        _temp: tempfile::TempDir,
        store: PictureStore,
        provider: Arc<FileProvider>,
        picked: Arc<PickedContentStore>,
        requests: RequestBook,
    }

    fn book(ttl_secs: u64) -> Book {
        let temp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(temp.path().join("Pictures"));
        let provider = Arc::new(FileProvider::new("text-ocr.provider", ttl_secs));
        let picked = Arc::new(PickedContentStore::new("text-ocr.gallery"));
        let requests = RequestBook::new(Arc::clone(&provider), Arc::clone(&picked));

        Book {
            _temp: temp,
            store,
            provider,
            picked,
            requests,
        }
    }

    #[tokio::test]
    async fn test_camera_shot_is_written_through_grant() {
        let b = book(60);
        let path = b.store.create_image_file().unwrap();
        let grant = b.provider.grant(&path);

        let (id, rx) = b.requests.open_camera(&grant.uri);
        assert_ok!(b.requests.complete_camera_capture(id, Some(b"jpeg bytes".to_vec())));

        assert_eq!(rx.await.unwrap(), CameraOutcome::Written);
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_camera_cancel_writes_nothing() {
        let b = book(60);
        let path = b.store.create_image_file().unwrap();
        let grant = b.provider.grant(&path);

        let (id, rx) = b.requests.open_camera(&grant.uri);
        assert_ok!(b.requests.complete_camera_capture(id, None));

        assert_eq!(rx.await.unwrap(), CameraOutcome::Cancelled);
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_camera_answer_for_unknown_or_answered_id_is_rejected() {
        let b = book(60);
        let path = b.store.create_image_file().unwrap();
        let grant = b.provider.grant(&path);

        let err = b.requests.complete_camera_capture(42, Some(b"x".to_vec())).unwrap_err();
        assert!(err.contains("Unknown or already answered"), "unexpected error: {}", err);

        let (id, _rx) = b.requests.open_camera(&grant.uri);
        assert_ok!(b.requests.complete_camera_capture(id, None));
        assert_err!(b.requests.complete_camera_capture(id, None));
        assert_err!(b.requests.fail_camera_capture(id, "late".to_string()));
    }

    #[tokio::test]
    async fn test_camera_write_after_revoked_grant_reports_failure() {
        let b = book(60);
        let path = b.store.create_image_file().unwrap();
        let grant = b.provider.grant(&path);

        let (id, rx) = b.requests.open_camera(&grant.uri);
        b.provider.revoke(&grant.uri);

        let err = b.requests.complete_camera_capture(id, Some(b"jpeg".to_vec())).unwrap_err();
        assert!(err.starts_with("Share grant expired"), "unexpected error: {}", err);
        assert_eq!(
            rx.await.unwrap(),
            CameraOutcome::Failed(CaptureError::ShareGrantExpired(grant.uri.to_string()))
        );
    }

    #[tokio::test]
    async fn test_unreadable_camera_payload_reports_reason() {
        let b = book(60);
        let grant = b.provider.grant(&b.store.create_image_file().unwrap());

        let (id, rx) = b.requests.open_camera(&grant.uri);
        assert_ok!(b.requests.fail_camera_capture(id, "Failed to decode base64".to_string()));

        assert_eq!(
            rx.await.unwrap(),
            CameraOutcome::Failed(CaptureError::ImageDecodeFailed("Failed to decode base64".to_string()))
        );
    }

    #[test]
    fn test_abandoned_camera_request_forgets_target() {
        let b = book(60);
        let grant = b.provider.grant(&b.store.create_image_file().unwrap());

        let (id, _rx) = b.requests.open_camera(&grant.uri);
        b.requests.abandon_camera(id);

        let err = b.requests.complete_camera_capture(id, Some(b"x".to_vec())).unwrap_err();
        assert!(err.contains("Unknown or already answered"));
    }

    #[tokio::test]
    async fn test_gallery_pick_registers_content() {
        let b = book(60);
        let (id, rx) = b.requests.open_gallery();
        assert_ok!(b.requests.complete_gallery_pick(id, Some(b"png bytes".to_vec())));

        let content = rx.await.unwrap().unwrap().expect("a selection");
        assert_eq!(content.content_parts().unwrap().0, "text-ocr.gallery");

        let mut bytes = Vec::new();
        b.picked.open(&content).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn test_gallery_nothing_picked() {
        let b = book(60);
        let (id, rx) = b.requests.open_gallery();
        assert_ok!(b.requests.complete_gallery_pick(id, None));

        assert_eq!(rx.await.unwrap(), Ok(None));
        assert_eq!(b.picked.len(), 0);
    }

    #[test]
    fn test_stale_gallery_answers_release_their_bytes() {
        let b = book(60);

        for _ in 0..3 {
            let (id, rx) = b.requests.open_gallery();
            // The controller moved on to a newer capture
            drop(rx);
            assert_err!(b.requests.complete_gallery_pick(id, Some(vec![1, 2, 3])));
        }

        assert_eq!(b.picked.len(), 0);
    }

    #[tokio::test]
    async fn test_gallery_failure_carries_reason() {
        let b = book(60);
        let (id, rx) = b.requests.open_gallery();
        assert_ok!(b.requests.fail_gallery_pick(id, "Failed to decode base64: bad".to_string()));

        assert_eq!(
            rx.await.unwrap(),
            Err(CaptureError::ImageDecodeFailed("Failed to decode base64: bad".to_string()))
        );
    }
}
