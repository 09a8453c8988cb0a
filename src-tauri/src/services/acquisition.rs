use crate::error::{CaptureError, CaptureResult};
use crate::models::capture::ContentRef;
use image::{DynamicImage, ImageReader};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// Opens readable streams for content references
pub trait ContentResolver: Send + Sync {
    fn open(&self, content: &ContentRef) -> CaptureResult<Box<dyn Read + Send>>;

    /// Forget content that will never be opened
    fn release(&self, _content: &ContentRef) {}
}

/// Decode the image file at a known path
pub fn decode_file(path: &Path) -> CaptureResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| CaptureError::ImageDecodeFailed(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| CaptureError::ImageDecodeFailed(e.to_string()))?;

    reader
        .decode()
        .map_err(|e| CaptureError::ImageDecodeFailed(e.to_string()))
}

/// Decode an image from a stream, consuming and dropping it
pub fn decode_stream(mut stream: Box<dyn Read + Send>) -> CaptureResult<DynamicImage> {
    let mut bytes = Vec::new();
    stream
        .read_to_end(&mut bytes)
        .map_err(|e| CaptureError::ImageDecodeFailed(e.to_string()))?;
    drop(stream);

    if bytes.is_empty() {
        return Err(CaptureError::ImageDecodeFailed("empty image data".to_string()));
    }

    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CaptureError::ImageDecodeFailed(e.to_string()))?
        .decode()
        .map_err(|e| CaptureError::ImageDecodeFailed(e.to_string()))
}

/// Open `content` through `resolver` and decode it
pub fn decode_content(resolver: &dyn ContentResolver, content: &ContentRef) -> CaptureResult<DynamicImage> {
    let stream = resolver.open(content)?;
    decode_stream(stream)
}

/// Resolver for `file://` references
#[derive(Default)]
pub struct FsContentResolver;

impl ContentResolver for FsContentResolver {
    fn open(&self, content: &ContentRef) -> CaptureResult<Box<dyn Read + Send>> {
        let path = content
            .to_file_path()
            .ok_or_else(|| CaptureError::UnknownContent(content.to_string()))?;

        let file = File::open(&path)
            .map_err(|e| CaptureError::ImageDecodeFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// In-memory content handed over by the gallery picker
///
/// Each entry can be opened once; opening releases the bytes.
pub struct PickedContentStore {
    authority: String,
    entries: Mutex<HashMap<String, Vec<u8>>>,
    files: FsContentResolver,
}

impl PickedContentStore {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            entries: Mutex::new(HashMap::new()),
            files: FsContentResolver,
        }
    }

    /// Register picked bytes and return the reference that opens them
    pub fn register(&self, data: Vec<u8>) -> ContentRef {
        let id = format!("{:016x}", rand::thread_rng().gen::<u64>());
        self.entries.lock().insert(id.clone(), data);
        ContentRef::content(&self.authority, &id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ContentResolver for PickedContentStore {
    fn open(&self, content: &ContentRef) -> CaptureResult<Box<dyn Read + Send>> {
        if content.to_file_path().is_some() {
            return self.files.open(content);
        }

        let unknown = || CaptureError::UnknownContent(content.to_string());
        let (authority, id) = content.content_parts().ok_or_else(unknown)?;
        if authority != self.authority {
            return Err(unknown());
        }

        let data = self.entries.lock().remove(id).ok_or_else(unknown)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn release(&self, content: &ContentRef) {
        if let Some((authority, id)) = content.content_parts() {
            if authority == self.authority && self.entries.lock().remove(id).is_some() {
                tracing::debug!(content = %content, "released unopened pick");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    /// Encode a small solid image in the given format
    pub(crate) fn encoded_image(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([200, 10, 10])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_decode_jpeg_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("JPEG_test.jpg");
        std::fs::write(&path, encoded_image(ImageFormat::Jpeg)).unwrap();

        let bitmap = decode_file(&path).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (16, 8));
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = decode_file(&temp.path().join("missing.jpg"));

        assert!(matches!(result, Err(CaptureError::ImageDecodeFailed(_))));
    }

    #[test]
    fn test_decode_empty_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(decode_file(&path), Err(CaptureError::ImageDecodeFailed(_))));
    }

    #[test]
    fn test_decode_stream_guesses_format() {
        let stream: Box<dyn Read + Send> = Box::new(Cursor::new(encoded_image(ImageFormat::Png)));
        let bitmap = decode_stream(stream).unwrap();

        assert_eq!(bitmap.width(), 16);
    }

    #[test]
    fn test_decode_stream_rejects_garbage() {
        let stream: Box<dyn Read + Send> = Box::new(Cursor::new(b"definitely not an image".to_vec()));
        assert!(matches!(decode_stream(stream), Err(CaptureError::ImageDecodeFailed(_))));
    }

    #[test]
    fn test_picked_content_opens_once() {
        let store = PickedContentStore::new("gallery");
        let content = store.register(encoded_image(ImageFormat::Png));
        assert_eq!(store.len(), 1);

        let bitmap = decode_content(&store, &content).unwrap();
        assert_eq!(bitmap.height(), 8);
        assert_eq!(store.len(), 0);

        assert_eq!(
            decode_content(&store, &content).unwrap_err(),
            CaptureError::UnknownContent(content.to_string())
        );
    }

    #[test]
    fn test_picked_store_falls_back_to_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pick.png");
        std::fs::write(&path, encoded_image(ImageFormat::Png)).unwrap();

        let store = PickedContentStore::new("gallery");
        let bitmap = decode_content(&store, &ContentRef::from_path(&path)).unwrap();
        assert_eq!(bitmap.width(), 16);
    }

    #[test]
    fn test_release_drops_unopened_pick() {
        let store = PickedContentStore::new("gallery");
        let content = store.register(encoded_image(ImageFormat::Png));
        let other = store.register(encoded_image(ImageFormat::Png));

        store.release(&content);
        store.release(&ContentRef::content("elsewhere", "x"));

        assert_eq!(store.len(), 1);
        assert!(store.open(&content).is_err());
        assert!(store.open(&other).is_ok());
    }

    #[test]
    fn test_encoded_fixture_is_png() {
        let bytes = encoded_image(ImageFormat::Png);
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let store = PickedContentStore::new("gallery");
        let result = store.open(&ContentRef::new("ftp://elsewhere/x"));

        assert!(matches!(result, Err(CaptureError::UnknownContent(_))));
    }
}
