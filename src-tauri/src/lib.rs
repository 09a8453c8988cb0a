mod commands;
mod error;
mod models;
mod services;
mod utils;

use commands::bridge::TauriBridge;
use commands::capture::{
    answer_camera_permission, capture_from_camera, complete_camera_capture, complete_gallery_pick,
    copy_recognized_text, get_view_state, pick_from_gallery,
};
use commands::config::{get_config_path, init_config_manager, load_config, save_config};
use commands::ocr::{check_ocr_health, OcrEngineState};
use services::acquisition::PickedContentStore;
use services::controller::{Collaborators, Controller, ControllerOptions};
use services::ocr::{HttpOcrEngine, OcrEngine, OcrSidecar};
use services::platform::Clipboard;
use services::storage::{FileProvider, PictureStore};
use std::sync::Arc;
use tauri::{Manager, RunEvent};

const GALLERY_AUTHORITY: &str = "text-ocr.gallery";

/// State wrapper for the bundled OCR server, when one is configured
type SidecarState = Arc<OcrSidecar>;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config_manager = init_config_manager().expect("Failed to initialize config manager");
    let config = config_manager
        .lock()
        .map(|manager| manager.load_or_default())
        .unwrap_or_default();

    utils::logging::init_logging(&config.logging);
    tracing::info!("starting text-ocr");

    let http_engine = HttpOcrEngine::new(&config.ocr).expect("Failed to initialize OCR engine");
    tracing::debug!(base_url = http_engine.base_url(), "OCR engine ready");
    let engine: Arc<dyn OcrEngine> = Arc::new(http_engine);
    let pictures_dir = config
        .capture
        .resolve_pictures_dir()
        .expect("Failed to resolve pictures directory");

    let setup_engine = Arc::clone(&engine);
    let app = tauri::Builder::default()
        .manage(config_manager)
        .manage(OcrEngineState(engine))
        .setup(move |app| {
            let provider = Arc::new(FileProvider::new(
                config.capture.provider_authority.clone(),
                config.capture.share_grant_ttl_secs,
            ));
            tracing::debug!(authority = provider.authority(), "file provider ready");
            let picked = Arc::new(PickedContentStore::new(GALLERY_AUTHORITY));
            let bridge = Arc::new(TauriBridge::new(
                app.handle().clone(),
                Arc::clone(&provider),
                Arc::clone(&picked),
            ));

            #[cfg(desktop)]
            let clipboard: Arc<dyn Clipboard> = Arc::new(services::clipboard::SystemClipboard::new());
            #[cfg(mobile)]
            let clipboard: Arc<dyn Clipboard> = bridge.clone();

            let collaborators = Collaborators {
                permissions: bridge.clone(),
                camera: bridge.clone(),
                gallery: bridge.clone(),
                content: picked,
                engine: setup_engine,
                clipboard,
                presenter: bridge.clone(),
            };
            let store = PictureStore::new(&pictures_dir);
            tracing::info!(dir = %store.dir().display(), "storing photos");
            let options = ControllerOptions {
                store,
                provider,
                delete_superseded_photos: config.capture.delete_superseded_photos,
            };

            let (controller, handle) = Controller::new(collaborators, options);
            tauri::async_runtime::spawn(controller.run());
            app.manage(handle);
            app.manage(bridge);

            if let Some(sidecar_config) = config.ocr.sidecar.clone() {
                let sidecar: SidecarState = Arc::new(OcrSidecar::new(sidecar_config, &config.ocr.server_url)?);
                let starting = Arc::clone(&sidecar);
                tauri::async_runtime::spawn_blocking(move || {
                    if let Err(e) = starting.start() {
                        tracing::error!(error = %e, "OCR server did not start");
                    }
                });
                app.manage(sidecar);
            }

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            capture_from_camera,
            pick_from_gallery,
            copy_recognized_text,
            get_view_state,
            answer_camera_permission,
            complete_camera_capture,
            complete_gallery_pick,
            check_ocr_health,
            save_config,
            load_config,
            get_config_path
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            if let Some(sidecar) = app.try_state::<SidecarState>() {
                sidecar.stop();
            }
        }
    });
}
