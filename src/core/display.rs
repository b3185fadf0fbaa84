// Display surface abstraction - where frames, skeletons and class info end up

use crate::models::capture::VideoFrame;
use crate::models::classifier::ClassInfo;
use crate::models::pose::Pose;

/// Rendering target for the control loop. No return contract: rendering
/// problems are the surface's own business and never stop a tick.
pub trait DisplaySurface: Send {
    /// Draw the camera frame, mirrored horizontally when `mirror` is set
    fn draw_frame(&mut self, frame: &VideoFrame, mirror: bool);

    /// Overlay skeleton and keypoints at or above `min_confidence`
    fn overlay_pose(&mut self, pose: &Pose, min_confidence: f32);

    /// Replace the per-class info text
    fn show_class_info(&mut self, rows: &[ClassInfo]);

    /// Show a user-visible message (e.g. camera failure)
    fn show_message(&mut self, message: &str);

    /// End of tick; flush whatever was drawn
    fn present(&mut self) {}
}
