// Off-screen canvas surface: renders into an RGBA buffer and logs class info

use crate::core::display::DisplaySurface;
use crate::models::capture::VideoFrame;
use crate::models::classifier::ClassInfo;
use crate::models::pose::{Pose, SKELETON};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::{info, warn};
use std::path::PathBuf;

const SKELETON_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);
const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);
const KEYPOINT_RADIUS: i32 = 3;

pub struct CanvasSurface {
    canvas: RgbaImage,
    rows: Vec<ClassInfo>,
    message: Option<String>,
    snapshot_path: Option<PathBuf>,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            rows: Vec::new(),
            message: None,
            snapshot_path: None,
        }
    }

    /// Write the canvas to `path` as PNG on every `present`
    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn rows(&self) -> &[ClassInfo] {
        &self.rows
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Info text as shown to the user; the emphasized row is wrapped in `**`
    pub fn info_lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                let line = format!("Class {}: {}", row.class, row.text());
                if row.emphasized {
                    format!("**{}**", line)
                } else {
                    line
                }
            })
            .collect()
    }
}

impl DisplaySurface for CanvasSurface {
    fn draw_frame(&mut self, frame: &VideoFrame, mirror: bool) {
        let Some(mut image) = frame.to_rgba_image() else {
            warn!(
                "Dropping malformed frame ({}x{}, {} bytes)",
                frame.width,
                frame.height,
                frame.data.len()
            );
            return;
        };
        if mirror {
            imageops::flip_horizontal_in_place(&mut image);
        }
        self.canvas = image;
    }

    fn overlay_pose(&mut self, pose: &Pose, min_confidence: f32) {
        for (from, to) in SKELETON {
            let (Some(a), Some(b)) = (pose.keypoint(from), pose.keypoint(to)) else {
                continue;
            };
            if a.is_visible(min_confidence) && b.is_visible(min_confidence) {
                draw_line_segment_mut(&mut self.canvas, (a.x, a.y), (b.x, b.y), SKELETON_COLOR);
            }
        }

        for keypoint in pose.keypoints.iter().filter(|kp| kp.is_visible(min_confidence)) {
            draw_filled_circle_mut(
                &mut self.canvas,
                (keypoint.x.round() as i32, keypoint.y.round() as i32),
                KEYPOINT_RADIUS,
                KEYPOINT_COLOR,
            );
        }
    }

    fn show_class_info(&mut self, rows: &[ClassInfo]) {
        // Only log when the text changes, not every tick
        let changed = self.rows.len() != rows.len()
            || self
                .rows
                .iter()
                .zip(rows)
                .any(|(old, new)| old.text() != new.text() || old.emphasized != new.emphasized);

        self.rows = rows.to_vec();
        if changed {
            for line in self.info_lines() {
                info!("{}", line);
            }
        }
    }

    fn show_message(&mut self, message: &str) {
        warn!("{}", message);
        self.message = Some(message.to_string());
    }

    fn present(&mut self) {
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = self.canvas.save(path) {
                warn!("Failed to write snapshot {}: {}", path.display(), e);
            }
        }
    }
}
