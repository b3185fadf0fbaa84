// Image-sequence camera: plays a directory of still frames in a loop

use crate::core::camera::{CameraSource, VideoStream};
use crate::models::capture::{CaptureError, CaptureResult, VideoFrame};
use async_trait::async_trait;
use image::imageops::FilterType;
use log::info;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Camera backed by image files, sorted by file name
pub struct ImageSequenceCamera {
    directory: PathBuf,
    width: u32,
    height: u32,
}

impl ImageSequenceCamera {
    pub fn new(directory: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            directory: directory.into(),
            width,
            height,
        }
    }

    fn list_frames(directory: &Path) -> CaptureResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(directory).map_err(|e| {
            CaptureError::CameraUnavailable(format!("{}: {}", directory.display(), e))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        Ok(frames)
    }
}

#[async_trait]
impl CameraSource for ImageSequenceCamera {
    async fn acquire(&self) -> CaptureResult<Box<dyn VideoStream>> {
        let directory = self.directory.clone();
        let frames = tokio::task::spawn_blocking(move || Self::list_frames(&directory))
            .await
            .map_err(|e| {
                CaptureError::CaptureFailed(format!("Frame listing task failed: {}", e))
            })??;

        if frames.is_empty() {
            return Err(CaptureError::CameraUnavailable(format!(
                "no frames found in {}",
                self.directory.display()
            )));
        }

        info!(
            "Acquired image-sequence camera: {} frames from {}",
            frames.len(),
            self.directory.display()
        );

        Ok(Box::new(ImageSequenceStream {
            frames,
            position: 0,
            width: self.width,
            height: self.height,
        }))
    }

    fn describe(&self) -> String {
        format!("image sequence at {}", self.directory.display())
    }
}

pub struct ImageSequenceStream {
    frames: Vec<PathBuf>,
    position: usize,
    width: u32,
    height: u32,
}

#[async_trait]
impl VideoStream for ImageSequenceStream {
    async fn next_frame(&mut self) -> CaptureResult<VideoFrame> {
        let path = self.frames[self.position].clone();
        self.position = (self.position + 1) % self.frames.len();

        let (width, height) = (self.width, self.height);
        tokio::task::spawn_blocking(move || -> CaptureResult<VideoFrame> {
            let image = image::open(&path)
                .map_err(|e| CaptureError::CaptureFailed(format!("{}: {}", path.display(), e)))?;
            let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgba8();
            Ok(VideoFrame::from_rgba_image(
                resized,
                chrono::Utc::now().timestamp_millis(),
            ))
        })
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("Frame decode task failed: {}", e)))?
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn test_dir(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("pose_teach_test_frames_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_directory_is_camera_unavailable() {
        let camera = ImageSequenceCamera::new("/nonexistent/pose_teach_frames", 30, 25);
        assert!(matches!(
            camera.acquire().await,
            Err(CaptureError::CameraUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_directory_is_camera_unavailable() {
        let dir = test_dir("empty");
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let camera = ImageSequenceCamera::new(&dir, 30, 25);
        assert!(matches!(
            camera.acquire().await,
            Err(CaptureError::CameraUnavailable(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_frames_loop_in_name_order_and_resize() {
        let dir = test_dir("loop");
        RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))
            .save(dir.join("b.png"))
            .unwrap();

        let camera = ImageSequenceCamera::new(&dir, 30, 25);
        let mut stream = camera.acquire().await.unwrap();
        assert_eq!(stream.dimensions(), (30, 25));

        let first = stream.next_frame().await.unwrap();
        let second = stream.next_frame().await.unwrap();
        let third = stream.next_frame().await.unwrap();

        assert_eq!((first.width, first.height), (30, 25));
        assert_eq!(&first.data[..4], &[255, 0, 0, 255]);
        assert_eq!(&second.data[..4], &[0, 0, 255, 255]);
        assert_eq!(&third.data[..4], &[255, 0, 0, 255]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
