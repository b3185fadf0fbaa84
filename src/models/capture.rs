// Data structures for camera capture

use image::RgbaImage;

/// A single camera frame, RGBA8 packed
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn from_rgba_image(image: RgbaImage, timestamp: i64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            timestamp,
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Solid-colour frame, mostly useful for tests and placeholders
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data,
        }
    }

    /// Copy into an `image` buffer; `None` when the data length is inconsistent
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Error types for camera operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
