use super::engine::{OcrEngine, OcrInput};
use crate::models::config::OcrConfig;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OCR engine backed by the on-device OCR server over HTTP
pub struct HttpOcrEngine {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ImageRequest {
    image_base64: String,
    rotation: u16,
}

/// Single text box with bounding box coordinates
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: Vec<Vec<f64>>, // 4 corner points [[x1,y1], [x2,y2], [x3,y3], [x4,y4]]
    text: String,
}

/// Unified OCR response from the server
#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
    #[serde(default)]
    raw_text: String,
}

impl TextBox {
    /// Get bounding box as (x_min, y_min, x_max, y_max)
    fn get_bbox_rect(&self) -> (f64, f64, f64, f64) {
        let mut rect = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in self.bbox.iter().filter(|p| p.len() >= 2) {
            rect.0 = rect.0.min(point[0]);
            rect.1 = rect.1.min(point[1]);
            rect.2 = rect.2.max(point[0]);
            rect.3 = rect.3.max(point[1]);
        }

        if rect.0.is_finite() {
            rect
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }

    fn left_x(&self) -> f64 {
        self.get_bbox_rect().0
    }

    fn center_y(&self) -> f64 {
        let (_, y_min, _, y_max) = self.get_bbox_rect();
        (y_min + y_max) / 2.0
    }
}

/// A run of boxes sharing one text line
struct Line {
    y_min: f64,
    y_max: f64,
    boxes: Vec<TextBox>,
}

impl Line {
    fn accepts(&self, text_box: &TextBox) -> bool {
        let center = text_box.center_y();
        center >= self.y_min && center <= self.y_max
    }
}

/// Flatten boxes into reading order: lines top to bottom, words left to right
fn flatten_boxes(mut boxes: Vec<TextBox>) -> String {
    boxes.retain(|b| !b.text.trim().is_empty());
    boxes.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut lines: Vec<Line> = Vec::new();
    for text_box in boxes {
        match lines.last_mut() {
            Some(line) if line.accepts(&text_box) => {
                let (_, y_min, _, y_max) = text_box.get_bbox_rect();
                line.y_min = line.y_min.min(y_min);
                line.y_max = line.y_max.max(y_max);
                line.boxes.push(text_box);
            }
            _ => {
                let (_, y_min, _, y_max) = text_box.get_bbox_rect();
                lines.push(Line {
                    y_min,
                    y_max,
                    boxes: vec![text_box],
                });
            }
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.boxes.sort_by(|a, b| a.left_x().total_cmp(&b.left_x()));
            line.boxes
                .iter()
                .map(|b| b.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl HttpOcrEngine {
    /// Create a new HTTP OCR engine from config
    ///
    /// Must not be called from inside an async task.
    pub fn new(config: &OcrConfig) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Encode image to base64 PNG
    fn encode_image(image: &DynamicImage) -> Result<String, String> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .map_err(|e| format!("Failed to encode image: {}", e))?;
        Ok(general_purpose::STANDARD.encode(&buffer))
    }
}

impl OcrEngine for HttpOcrEngine {
    fn recognize(&self, input: OcrInput<'_>) -> Result<String, String> {
        let image_base64 = Self::encode_image(input.image)?;
        let url = format!("{}/ocr", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ImageRequest {
                image_base64,
                rotation: input.rotation_degrees,
            })
            .send()
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("OCR server error: {}", error_text));
        }

        let data: OcrResponse = response
            .json()
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let text = flatten_boxes(data.boxes);
        if text.is_empty() {
            return Ok(data.raw_text);
        }

        Ok(text)
    }

    fn health_check(&self) -> Result<(), String> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| format!("Health check failed: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Health check failed: HTTP {}", response.status()))
        }
    }
}
