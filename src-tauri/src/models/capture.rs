use crate::utils::image_data::encode_preview_data_url;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque, scheme-qualified handle to external content
///
/// `file://` refers to a local file, `content://<authority>/<id>` to content
/// that only a provider or resolver can open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(format!("file://{}", path.display()))
    }

    pub fn content(authority: &str, id: &str) -> Self {
        Self::new(format!("content://{}/{}", authority, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local path for `file://` references
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix("file://").map(PathBuf::from)
    }

    /// `(authority, id)` for `content://` references
    pub fn content_parts(&self) -> Option<(&str, &str)> {
        self.0.strip_prefix("content://")?.split_once('/')
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a captured image came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageSource {
    Camera { path: PathBuf },
    Gallery { content: ContentRef },
}

/// Decoded bitmap plus its origin
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bitmap: DynamicImage,
    pub source: Option<ImageSource>,
    data_url: Option<String>,
}

impl CapturedImage {
    /// Wrap a decoded bitmap, encoding its preview up front
    ///
    /// Encoding is CPU work; build this off the dispatcher.
    pub fn new(bitmap: DynamicImage, source: ImageSource) -> Self {
        let data_url = match encode_preview_data_url(&bitmap) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, "no preview for captured image");
                None
            }
        };

        Self {
            bitmap,
            source: Some(source),
            data_url,
        }
    }

    pub fn preview(&self) -> ImagePreview {
        ImagePreview {
            width: self.bitmap.width(),
            height: self.bitmap.height(),
            source: self.source.clone(),
            data_url: self.data_url.clone(),
        }
    }
}

/// What the image view shows for the current capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePreview {
    pub width: u32,
    pub height: u32,
    pub source: Option<ImageSource>,
    /// Downscaled bitmap as a `data:image/jpeg;base64,` URL
    pub data_url: Option<String>,
}

/// Outcome of one OCR call
pub type RecognitionResult = Result<String, String>;
