pub mod engine;
pub mod http_ocr;
pub mod sidecar;

// Re-export main types
pub use engine::{OcrEngine, OcrInput};
pub use http_ocr::HttpOcrEngine;
pub use sidecar::OcrSidecar;
