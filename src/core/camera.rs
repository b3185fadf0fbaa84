// Camera abstraction layer - unified interface for frame sources

use crate::models::capture::{CaptureResult, VideoFrame};
use async_trait::async_trait;

/// Something that can be asked for a live video stream
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Acquire the camera; fails with `CaptureError::CameraUnavailable`
    /// when there is no device or permission is denied
    async fn acquire(&self) -> CaptureResult<Box<dyn VideoStream>>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// An acquired stream of frames
#[async_trait]
pub trait VideoStream: Send {
    /// The current frame
    async fn next_frame(&mut self) -> CaptureResult<VideoFrame>;

    /// Frame dimensions delivered by this stream
    fn dimensions(&self) -> (u32, u32);
}
