//! Capture controller
//!
//! One dispatcher task owns all capture state. User actions and every
//! asynchronous completion (permission answer, camera result, gallery pick,
//! decode, OCR outcome) arrive as [`Event`]s on a single channel, so state is
//! only ever mutated from that task.
//!
//! Each user-initiated capture opens a new cycle. Completions carry the cycle
//! they were started for and are dropped once a newer cycle has begun, so a
//! slow recognition can never overwrite the result of a later capture.
//! Platform requests still unanswered when a cycle ends are cancelled.

use crate::error::{CaptureError, CaptureResult};
use crate::models::capture::{CapturedImage, ContentRef, ImageSource, RecognitionResult};
use crate::models::view_state::{Phase, UiUpdate, ViewState};
use crate::services::acquisition::{self, ContentResolver};
use crate::services::ocr::{OcrEngine, OcrInput};
use crate::services::platform::{
    CameraLauncher, CameraOutcome, Clipboard, Completion, GalleryPicker, GallerySelection,
    PermissionGate, Presenter, IMAGE_MIME,
};
use crate::services::storage::{FileProvider, PictureStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

const CLIP_LABEL: &str = "recognized text";
const COPIED_NOTICE: &str = "Text copied";

/// External facilities the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionGate>,
    pub camera: Arc<dyn CameraLauncher>,
    pub gallery: Arc<dyn GalleryPicker>,
    pub content: Arc<dyn ContentResolver>,
    pub engine: Arc<dyn OcrEngine>,
    pub clipboard: Arc<dyn Clipboard>,
    pub presenter: Arc<dyn Presenter>,
}

/// Photo storage used by the camera path
pub struct ControllerOptions {
    pub store: PictureStore,
    pub provider: Arc<FileProvider>,
    /// Remove the previous camera photo once a new one replaces it
    pub delete_superseded_photos: bool,
}

enum Event {
    CaptureFromCamera,
    PickFromGallery,
    Copy(oneshot::Sender<CaptureResult<String>>),
    Snapshot(oneshot::Sender<ViewState>),
    PermissionAnswered { cycle: u64, granted: bool },
    CameraFinished { cycle: u64, outcome: CameraOutcome },
    GalleryPicked { cycle: u64, selection: GallerySelection },
    Decoded { cycle: u64, outcome: CaptureResult<CapturedImage> },
    Recognized { cycle: u64, outcome: RecognitionResult },
}

/// Cloneable front door to the dispatcher
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl ControllerHandle {
    fn send(&self, event: Event) -> Result<(), String> {
        self.tx
            .send(event)
            .map_err(|_| "Capture controller is not running".to_string())
    }

    /// Ask for camera permission, then capture and recognize a photo
    pub fn capture_from_camera(&self) -> Result<(), String> {
        self.send(Event::CaptureFromCamera)
    }

    /// Pick an image from the gallery and recognize it
    pub fn pick_from_gallery(&self) -> Result<(), String> {
        self.send(Event::PickFromGallery)
    }

    /// Copy the displayed recognized text, returning what was copied
    pub async fn copy_recognized_text(&self) -> Result<String, String> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Copy(tx))?;
        rx.await
            .map_err(|_| "Capture controller stopped".to_string())?
            .map_err(|e| e.to_string())
    }

    pub async fn view_state(&self) -> Result<ViewState, String> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Snapshot(tx))?;
        rx.await.map_err(|_| "Capture controller stopped".to_string())
    }
}

/// State owned by the dispatcher task
pub struct Controller {
    collaborators: Collaborators,
    options: ControllerOptions,
    rx: mpsc::UnboundedReceiver<Event>,
    completions: mpsc::WeakUnboundedSender<Event>,
    /// Tasks awaiting platform answers for the current cycle
    waiting: Vec<AbortHandle>,
    cycle: u64,
    phase: Phase,
    current_photo_path: Option<PathBuf>,
    current_grant: Option<ContentRef>,
    image: Option<CapturedImage>,
    result_text: Option<String>,
    copy_visible: bool,
    /// Text the copy action is bound to, captured at recognition time
    copy_payload: Option<String>,
}

impl Controller {
    pub fn new(collaborators: Collaborators, options: ControllerOptions) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            collaborators,
            options,
            rx,
            completions: tx.downgrade(),
            waiting: Vec::new(),
            cycle: 0,
            phase: Phase::Idle,
            current_photo_path: None,
            current_grant: None,
            image: None,
            result_text: None,
            copy_visible: false,
            copy_payload: None,
        };
        (controller, ControllerHandle { tx })
    }

    /// Run the dispatcher until every handle and pending completion is gone
    pub async fn run(mut self) {
        tracing::info!("capture controller started");
        while let Some(event) = self.rx.recv().await {
            self.handle(event);
        }
        tracing::info!("capture controller stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::CaptureFromCamera => self.on_capture_from_camera(),
            Event::PickFromGallery => self.on_pick_from_gallery(),
            Event::Copy(reply) => {
                let _ = reply.send(self.on_copy());
            }
            Event::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::PermissionAnswered { cycle, granted } => {
                if self.is_current(cycle, "permission") {
                    self.on_permission(granted);
                }
            }
            Event::CameraFinished { cycle, outcome } => {
                if self.is_current(cycle, "camera") {
                    self.on_camera_finished(outcome);
                }
            }
            Event::GalleryPicked { cycle, selection } => {
                if self.is_current(cycle, "gallery") {
                    self.on_gallery_picked(selection);
                } else if let Ok(Some(content)) = selection {
                    self.collaborators.content.release(&content);
                }
            }
            Event::Decoded { cycle, outcome } => {
                if self.is_current(cycle, "decode") {
                    self.on_decoded(outcome);
                }
            }
            Event::Recognized { cycle, outcome } => {
                if self.is_current(cycle, "recognition") {
                    self.on_recognized(outcome);
                }
            }
        }
    }

    fn is_current(&self, cycle: u64, what: &str) -> bool {
        if cycle == self.cycle {
            return true;
        }
        tracing::debug!(cycle, current = self.cycle, what, "dropping stale completion");
        false
    }

    fn snapshot(&self) -> ViewState {
        ViewState {
            phase: self.phase,
            image: self.image.as_ref().map(CapturedImage::preview),
            result_text: self.result_text.clone(),
            copy_visible: self.copy_visible,
        }
    }

    fn present(&self, update: UiUpdate) {
        self.collaborators.presenter.apply(update);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, cycle = self.cycle, "phase");
            self.phase = phase;
            self.present(UiUpdate::Phase(phase));
        }
    }

    fn notify(&self, error: &CaptureError) {
        tracing::warn!(cycle = self.cycle, error = %error, "capture cycle failed");
        self.present(UiUpdate::Notice(error.to_string()));
    }

    fn fail(&mut self, error: CaptureError, phase: Phase) {
        self.notify(&error);
        self.set_phase(phase);
    }

    fn begin_cycle(&mut self) -> u64 {
        if !self.phase.is_terminal() {
            tracing::info!(cycle = self.cycle, phase = ?self.phase, "superseding unfinished capture");
        }
        self.cycle += 1;
        for task in self.waiting.drain(..) {
            task.abort();
        }
        if let Some(grant) = self.current_grant.take() {
            self.options.provider.revoke(&grant);
        }
        tracing::debug!(cycle = self.cycle, "new capture cycle");
        self.cycle
    }

    /// Deliver `rx`'s value back to the dispatcher as an event
    ///
    /// The wait is aborted, dropping `rx`, when the next cycle begins.
    fn forward<T, F>(&mut self, rx: Completion<T>, into_event: F)
    where
        T: Send + 'static,
        F: FnOnce(Option<T>) -> Event + Send + 'static,
    {
        let completions = self.completions.clone();
        let task = tokio::spawn(async move {
            let event = into_event(rx.await.ok());
            if let Some(tx) = completions.upgrade() {
                let _ = tx.send(event);
            }
        });

        self.waiting.retain(|t| !t.is_finished());
        self.waiting.push(task.abort_handle());
    }

    /// Run blocking work off the dispatcher and post its event back
    fn offload<F>(&self, work: F)
    where
        F: FnOnce() -> Event + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(work).await {
                Ok(event) => {
                    if let Some(tx) = completions.upgrade() {
                        let _ = tx.send(event);
                    }
                }
                Err(e) => tracing::error!(error = %e, "blocking task failed"),
            }
        });
    }

    fn on_capture_from_camera(&mut self) {
        let cycle = self.begin_cycle();
        self.set_phase(Phase::PermissionRequested);

        let rx = self.collaborators.permissions.request_camera_permission();
        self.forward(rx, move |granted| Event::PermissionAnswered {
            cycle,
            granted: granted.unwrap_or(false),
        });
    }

    fn on_permission(&mut self, granted: bool) {
        if !granted {
            self.fail(CaptureError::PermissionDenied, Phase::Idle);
            return;
        }

        let path = match self.options.store.create_image_file() {
            Ok(path) => path,
            Err(e) => {
                self.fail(e, Phase::ErrorShown);
                return;
            }
        };

        self.replace_photo_path(path.clone());
        let grant = self.options.provider.grant(&path);
        self.current_grant = Some(grant.uri.clone());
        self.set_phase(Phase::Capturing);

        let cycle = self.cycle;
        let rx = self.collaborators.camera.take_picture(&grant);
        self.forward(rx, move |outcome| Event::CameraFinished {
            cycle,
            outcome: outcome.unwrap_or(CameraOutcome::Cancelled),
        });
    }

    fn replace_photo_path(&mut self, path: PathBuf) {
        if let Some(previous) = self.current_photo_path.replace(path) {
            if self.options.delete_superseded_photos {
                self.options.store.discard(&previous);
            }
        }
    }

    fn on_camera_finished(&mut self, outcome: CameraOutcome) {
        if let Some(grant) = self.current_grant.take() {
            self.options.provider.revoke(&grant);
        }

        match outcome {
            CameraOutcome::Written => {}
            CameraOutcome::Cancelled => {
                tracing::info!(cycle = self.cycle, "camera capture cancelled");
                self.set_phase(Phase::Idle);
                return;
            }
            CameraOutcome::Failed(error) => {
                self.fail(error, Phase::ErrorShown);
                return;
            }
        }

        let Some(path) = self.current_photo_path.clone() else {
            self.fail(
                CaptureError::ImageDecodeFailed("no photo file for this capture".to_string()),
                Phase::ErrorShown,
            );
            return;
        };

        self.set_phase(Phase::Decoding);
        let cycle = self.cycle;
        self.offload(move || {
            let outcome = acquisition::decode_file(&path)
                .map(|bitmap| CapturedImage::new(bitmap, ImageSource::Camera { path }));
            Event::Decoded { cycle, outcome }
        });
    }

    fn on_pick_from_gallery(&mut self) {
        let cycle = self.begin_cycle();
        self.set_phase(Phase::Capturing);

        let rx = self.collaborators.gallery.pick_image(IMAGE_MIME);
        self.forward(rx, move |selection| Event::GalleryPicked {
            cycle,
            selection: selection.unwrap_or(Ok(None)),
        });
    }

    fn on_gallery_picked(&mut self, selection: GallerySelection) {
        let content = match selection {
            Ok(Some(content)) => content,
            Ok(None) => {
                self.fail(CaptureError::NoSelectionMade, Phase::Idle);
                return;
            }
            Err(e) => {
                self.fail(e, Phase::ErrorShown);
                return;
            }
        };

        self.set_phase(Phase::Decoding);
        let cycle = self.cycle;
        let resolver = Arc::clone(&self.collaborators.content);
        self.offload(move || {
            let outcome = acquisition::decode_content(resolver.as_ref(), &content)
                .map(|bitmap| CapturedImage::new(bitmap, ImageSource::Gallery { content }));
            Event::Decoded { cycle, outcome }
        });
    }

    fn on_decoded(&mut self, outcome: CaptureResult<CapturedImage>) {
        let captured = match outcome {
            Ok(captured) => captured,
            Err(e) => {
                self.fail(e, Phase::ErrorShown);
                return;
            }
        };

        self.present(UiUpdate::Image(captured.preview()));
        let bitmap = captured.bitmap.clone();
        self.image = Some(captured);
        self.set_phase(Phase::Recognizing);

        let cycle = self.cycle;
        let engine = Arc::clone(&self.collaborators.engine);
        self.offload(move || {
            let outcome = engine.recognize(OcrInput::upright(&bitmap));
            Event::Recognized { cycle, outcome }
        });
    }

    fn on_recognized(&mut self, outcome: RecognitionResult) {
        match outcome {
            Ok(text) => {
                tracing::info!(cycle = self.cycle, chars = text.chars().count(), "text recognized");
                self.present(UiUpdate::ResultText(text.clone()));
                self.result_text = Some(text.clone());
                self.copy_payload = Some(text);
                if !self.copy_visible {
                    self.copy_visible = true;
                    self.present(UiUpdate::CopyVisible(true));
                }
                self.set_phase(Phase::ResultShown);
            }
            Err(message) => self.fail(CaptureError::RecognitionFailed(message), Phase::ErrorShown),
        }
    }

    fn on_copy(&self) -> CaptureResult<String> {
        let text = self
            .copy_payload
            .clone()
            .ok_or_else(|| CaptureError::ClipboardFailed("no recognized text yet".to_string()))?;

        if let Err(e) = self.collaborators.clipboard.set_plain_text(CLIP_LABEL, &text) {
            let error = CaptureError::ClipboardFailed(e);
            self.notify(&error);
            return Err(error);
        }

        self.present(UiUpdate::Notice(COPIED_NOTICE.to_string()));
        Ok(text)
    }
}
