use image::DynamicImage;

/// Image handed to an OCR engine
#[derive(Debug, Clone, Copy)]
pub struct OcrInput<'a> {
    pub image: &'a DynamicImage,
    /// Clockwise rotation the engine should assume, in degrees
    pub rotation_degrees: u16,
}

impl<'a> OcrInput<'a> {
    /// Input with no rotation applied
    pub fn upright(image: &'a DynamicImage) -> Self {
        Self {
            image,
            rotation_degrees: 0,
        }
    }
}

/// OCR Engine trait - abstraction over the external recognizer
///
/// Implementations may block; callers run them off the dispatcher.
pub trait OcrEngine: Send + Sync {
    /// Recognize all text in the image with default engine settings
    ///
    /// `Ok` may hold an empty string when the image has no text.
    fn recognize(&self, input: OcrInput<'_>) -> Result<String, String>;

    /// Check whether the engine can currently serve requests
    fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
