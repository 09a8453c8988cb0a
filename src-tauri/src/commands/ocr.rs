use crate::services::ocr::OcrEngine;
use std::sync::Arc;
use tauri::State;

/// State wrapper for the OCR engine shared with the controller
pub struct OcrEngineState(pub Arc<dyn OcrEngine>);

/// Tauri command: Check OCR engine health
#[tauri::command]
pub async fn check_ocr_health(state: State<'_, OcrEngineState>) -> Result<bool, String> {
    let engine = Arc::clone(&state.0);

    let healthy = tokio::task::spawn_blocking(move || engine.health_check())
        .await
        .map_err(|e| format!("Health check task failed: {}", e))?;

    match healthy {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!(error = %e, "OCR engine unhealthy");
            Ok(false)
        }
    }
}
