use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Longest edge of the preview shown in the image view
pub const PREVIEW_MAX_EDGE: u32 = 1024;

/// Decode base64 image bytes sent by the frontend
///
/// Accepts plain base64 or a `data:<mime>;base64,` URL.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>, String> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| format!("Failed to decode base64: {}", e))?;

    if bytes.is_empty() {
        return Err("Image data is empty".to_string());
    }

    Ok(bytes)
}

/// Encode a displayable JPEG `data:` URL, downscaled to fit the image view
pub fn encode_preview_data_url(image: &DynamicImage) -> Result<String, String> {
    let scaled = if image.width() > PREVIEW_MAX_EDGE || image.height() > PREVIEW_MAX_EDGE {
        image.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE)
    } else {
        image.clone()
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| format!("Failed to encode preview: {}", e))?;

    let base64_str = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/jpeg;base64,{}", base64_str))
}
