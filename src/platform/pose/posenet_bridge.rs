// Pose estimation bridge
// Abstraction over single-person pose models; the ONNX backend runs PoseNet natively

use crate::models::capture::VideoFrame;
use crate::models::pose::{EstimateParams, Pose, PoseError, PoseResult, KEYPOINT_COUNT};
use async_trait::async_trait;
use std::path::Path;

/// Pose estimator capability consumed by the feature extractor
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// Estimate a single pose in `frame`
    async fn estimate(&self, frame: &VideoFrame, params: &EstimateParams) -> PoseResult<Pose>;

    /// Number of keypoints every returned pose carries
    fn keypoint_count(&self) -> usize {
        KEYPOINT_COUNT
    }

    /// Check if a model is loaded
    fn is_initialized(&self) -> bool;

    /// Get model info
    fn get_model_info(&self) -> String;
}

// ==============================================================================
// ONNX Runtime Implementation (PoseNet, single pose)
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend {
    use super::*;
    use crate::models::pose::{BodyPart, Keypoint};
    use image::imageops::FilterType;
    use log::info;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::sync::Mutex;

    /// Square input resolution of the MobileNet PoseNet export
    const INPUT_SIZE: u32 = 257;

    pub struct OnnxPoseNet {
        session: Mutex<Session>,
        model_name: String,
    }

    impl OnnxPoseNet {
        pub fn load(model_path: &Path) -> PoseResult<Self> {
            let load_failed =
                |e: String| PoseError::ModelLoadFailed(format!("{}: {}", model_path.display(), e));
            let session = Session::builder()
                .map_err(|e| load_failed(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| load_failed(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e| load_failed(e.to_string()))?;

            let model_name = model_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "posenet".to_string());

            info!("OnnxPoseNet loaded {}", model_name);
            Ok(Self {
                session: Mutex::new(session),
                model_name,
            })
        }

        /// Resize to the model input and normalise to [-1, 1], NHWC
        fn preprocess(frame: &VideoFrame) -> PoseResult<Vec<f32>> {
            let image = frame
                .to_rgba_image()
                .ok_or_else(|| {
                    PoseError::InvalidFrame("pixel data does not match dimensions".to_string())
                })?;
            let resized =
                image::imageops::resize(&image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

            let mut input = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
            for pixel in resized.pixels() {
                for channel in &pixel.0[..3] {
                    input.push(*channel as f32 / 127.5 - 1.0);
                }
            }
            Ok(input)
        }
    }

    #[async_trait]
    impl PoseEstimator for OnnxPoseNet {
        async fn estimate(&self, frame: &VideoFrame, params: &EstimateParams) -> PoseResult<Pose> {
            let input = Self::preprocess(frame)?;
            let shape = [1usize, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];
            let input_tensor = Tensor::from_array((shape, input.into_boxed_slice()))
                .map_err(|e| {
                    PoseError::InferenceFailed(format!("Failed to build input tensor: {}", e))
                })?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| PoseError::InferenceFailed("Session lock poisoned".to_string()))?;
            let outputs = session
                .run(ort::inputs![input_tensor])
                .map_err(|e| {
                    PoseError::InferenceFailed(format!("PoseNet inference failed: {}", e))
                })?;

            // Output 0: heatmaps [1, h, w, 17]; output 1: offsets [1, h, w, 34] (y then x)
            let mut values = outputs.iter().map(|(_, value)| value);
            let heatmaps = values
                .next()
                .ok_or_else(|| PoseError::InferenceFailed("Missing heatmap output".to_string()))?;
            let offsets = values
                .next()
                .ok_or_else(|| PoseError::InferenceFailed("Missing offset output".to_string()))?;

            let (heat_shape, heat) = heatmaps
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    PoseError::InferenceFailed(format!("Failed to extract heatmaps: {}", e))
                })?;
            let (_, offs) = offsets
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    PoseError::InferenceFailed(format!("Failed to extract offsets: {}", e))
                })?;

            // Only NHWC exports with one heatmap channel per keypoint are supported
            if heat_shape.len() != 4 || heat_shape[3] != KEYPOINT_COUNT as i64 {
                return Err(PoseError::InferenceFailed(format!(
                    "Unexpected heatmap shape {:?}, expected [1, h, w, {}]",
                    &heat_shape[..],
                    KEYPOINT_COUNT
                )));
            }
            let grid_h = heat_shape[1] as usize;
            let grid_w = heat_shape[2] as usize;

            let decoded =
                decode_single_pose(heat, offs, grid_h, grid_w, params.output_stride as f32)?;

            let scale_x = frame.width as f32 / INPUT_SIZE as f32;
            let scale_y = frame.height as f32 / INPUT_SIZE as f32;
            let keypoints: Vec<Keypoint> = decoded
                .iter()
                .enumerate()
                .filter_map(|(i, (score, x, y))| {
                    let part = BodyPart::from_index(i)?;
                    let mut x = x * scale_x;
                    if params.flip_horizontal {
                        x = frame.width as f32 - 1.0 - x;
                    }
                    Some(Keypoint::new(part, *score, x, y * scale_y))
                })
                .collect();

            let mut pose = Pose { score: 0.0, keypoints };
            pose.score = pose.mean_keypoint_score();
            Ok(pose)
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> String {
            format!("ONNX Runtime PoseNet ({})", self.model_name)
        }
    }
}

// ==============================================================================
// PoseNet Decoding
// ==============================================================================

/// Argmax each heatmap channel and refine with the matching offsets.
///
/// `heatmaps` is `[h, w, 17]` and `offsets` is `[h, w, 34]` (y offsets, then x),
/// both row-major. Returns `(score, x, y)` per keypoint in model input pixels.
pub fn decode_single_pose(
    heatmaps: &[f32],
    offsets: &[f32],
    grid_h: usize,
    grid_w: usize,
    stride: f32,
) -> PoseResult<Vec<(f32, f32, f32)>> {
    let cells = grid_h * grid_w;
    if cells == 0 {
        return Err(PoseError::InferenceFailed(format!(
            "Empty heatmap grid {}x{}",
            grid_h, grid_w
        )));
    }
    if heatmaps.len() != cells * KEYPOINT_COUNT {
        return Err(PoseError::InferenceFailed(format!(
            "Heatmaps hold {} values, expected {} for a {}x{} grid",
            heatmaps.len(),
            cells * KEYPOINT_COUNT,
            grid_h,
            grid_w
        )));
    }
    if offsets.len() != cells * KEYPOINT_COUNT * 2 {
        return Err(PoseError::InferenceFailed(format!(
            "Offsets hold {} values, expected {} for a {}x{} grid",
            offsets.len(),
            cells * KEYPOINT_COUNT * 2,
            grid_h,
            grid_w
        )));
    }

    let mut keypoints = Vec::with_capacity(KEYPOINT_COUNT);

    for k in 0..KEYPOINT_COUNT {
        let mut best = (f32::NEG_INFINITY, 0usize, 0usize);
        for y in 0..grid_h {
            for x in 0..grid_w {
                let value = heatmaps[(y * grid_w + x) * KEYPOINT_COUNT + k];
                if value > best.0 {
                    best = (value, y, x);
                }
            }
        }

        let (logit, y, x) = best;
        let offset_base = (y * grid_w + x) * KEYPOINT_COUNT * 2;
        let offset_y = offsets[offset_base + k];
        let offset_x = offsets[offset_base + k + KEYPOINT_COUNT];
        let score = 1.0 / (1.0 + (-logit).exp());

        keypoints.push((
            score,
            x as f32 * stride + offset_x,
            y as f32 * stride + offset_y,
        ));
    }

    Ok(keypoints)
}

// ==============================================================================
// Null Implementation (no model available)
// ==============================================================================

/// Reports "no detection" for every frame: all keypoints present, zero confidence
pub struct NullPoseEstimator;

#[async_trait]
impl PoseEstimator for NullPoseEstimator {
    async fn estimate(&self, _frame: &VideoFrame, _params: &EstimateParams) -> PoseResult<Pose> {
        Ok(Pose::empty())
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn get_model_info(&self) -> String {
        "Null pose estimator (no inference - enable 'ml-onnx' and pass a model)".to_string()
    }
}

// ==============================================================================
// Backend Selection
// ==============================================================================

/// Build the best available estimator for `model_path`
pub fn create_pose_estimator(model_path: Option<&Path>) -> PoseResult<Box<dyn PoseEstimator>> {
    match model_path {
        #[cfg(feature = "ml-onnx")]
        Some(path) => Ok(Box::new(onnx_backend::OnnxPoseNet::load(path)?)),
        #[cfg(not(feature = "ml-onnx"))]
        Some(path) => {
            log::warn!(
                "Ignoring pose model {}: built without the 'ml-onnx' feature",
                path.display()
            );
            Ok(Box::new(NullPoseEstimator))
        }
        None => Ok(Box::new(NullPoseEstimator)),
    }
}
