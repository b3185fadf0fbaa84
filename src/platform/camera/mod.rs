// Camera sources
// Each source implements the CameraSource interface defined in core/camera.rs

pub mod image_sequence;

pub use image_sequence::ImageSequenceCamera;
