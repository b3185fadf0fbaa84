// Scripted teaching session without a camera or pose model
//
// Three synthetic "gestures" are encoded as frame colours; a toy estimator
// maps each colour to a different arm position.

use async_trait::async_trait;
use pose_teach_lib::core::camera::{CameraSource, VideoStream};
use pose_teach_lib::core::config::Config;
use pose_teach_lib::core::feature_extractor::FeatureExtractor;
use pose_teach_lib::core::knn::create_knn_classifier;
use pose_teach_lib::core::label_store::LabelStore;
use pose_teach_lib::core::teach_loop::TeachLoop;
use pose_teach_lib::models::capture::{CaptureError, CaptureResult, VideoFrame};
use pose_teach_lib::models::classifier::ClassIndex;
use pose_teach_lib::models::pose::{
    BodyPart, EstimateParams, Keypoint, Pose, PoseError, PoseResult,
};
use pose_teach_lib::platform::display::CanvasSurface;
use pose_teach_lib::platform::pose::PoseEstimator;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const GESTURES: [(&str, [u8; 4]); 3] = [
    ("arms up", [200, 40, 40, 255]),
    ("arms out", [40, 200, 40, 255]),
    ("arms down", [40, 40, 200, 255]),
];

/// Camera showing whichever gesture is currently selected
struct PuppetCamera {
    gesture: Arc<Mutex<usize>>,
}

struct PuppetStream {
    gesture: Arc<Mutex<usize>>,
    ticks: u64,
}

#[async_trait]
impl CameraSource for PuppetCamera {
    async fn acquire(&self) -> CaptureResult<Box<dyn VideoStream>> {
        Ok(Box::new(PuppetStream {
            gesture: self.gesture.clone(),
            ticks: 0,
        }))
    }

    fn describe(&self) -> String {
        "puppet camera".to_string()
    }
}

#[async_trait]
impl VideoStream for PuppetStream {
    async fn next_frame(&mut self) -> CaptureResult<VideoFrame> {
        let gesture = *self
            .gesture
            .lock()
            .map_err(|_| CaptureError::CaptureFailed("gesture lock poisoned".into()))?;
        self.ticks += 1;
        let mut frame = VideoFrame::solid(300, 250, GESTURES[gesture].1);
        frame.timestamp = self.ticks as i64 * 33;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (300, 250)
    }
}

/// Reads the gesture back from the frame colour and places the wrists accordingly
struct ColourPoseEstimator;

#[async_trait]
impl PoseEstimator for ColourPoseEstimator {
    async fn estimate(&self, frame: &VideoFrame, _params: &EstimateParams) -> PoseResult<Pose> {
        let pixel = frame
            .data
            .get(0..3)
            .ok_or_else(|| PoseError::InvalidFrame("empty frame".to_string()))?;
        let wrist_y = if pixel[0] > 100 {
            40.0
        } else if pixel[1] > 100 {
            120.0
        } else {
            210.0
        };
        // Small per-frame jitter so examples are not identical
        let jitter = (frame.timestamp % 7) as f32;

        let keypoints = BodyPart::ALL
            .iter()
            .map(|part| {
                let y = match part {
                    BodyPart::LeftWrist | BodyPart::RightWrist => wrist_y + jitter,
                    _ => 60.0 + part.index() as f32 * 10.0,
                };
                Keypoint::new(*part, 0.9, 150.0 + part.index() as f32, y)
            })
            .collect();

        Ok(Pose { score: 0.9, keypoints })
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn get_model_info(&self) -> String {
        "colour-coded puppet".to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== Scripted Teaching Session ===\n");

    let config = Config {
        model_cache_dir: std::env::temp_dir().join("pose_teach_demo_models"),
        ..Config::default()
    };
    let gesture = Arc::new(Mutex::new(0usize));
    let camera = PuppetCamera { gesture: gesture.clone() };
    let extractor = FeatureExtractor::new(Box::new(ColourPoseEstimator), config.estimate_params());
    let store = LabelStore::new(create_knn_classifier(), &config);
    let surface = CanvasSurface::new(config.frame_width, config.frame_height);
    let (_tx, rx) = mpsc::channel(1);

    let mut teach_loop =
        TeachLoop::start(config, &camera, extractor, store, Box::new(surface), rx).await?;

    // Step 1: record examples, holding each button for a few ticks
    println!("Step 1: Recording examples...");
    for (class, (name, _)) in GESTURES.iter().enumerate() {
        if let Ok(mut current) = gesture.lock() {
            *current = class;
        }
        teach_loop.press(ClassIndex(class));
        for _ in 0..(4 + class) {
            teach_loop.tick().await?;
        }
        teach_loop.release();
        println!(
            "✓ Class {} ({}): {} examples",
            class,
            name,
            teach_loop.store().example_count(ClassIndex(class))
        );
    }

    // Step 2: show each gesture again and predict
    println!("\nStep 2: Predicting...");
    for (class, (name, _)) in GESTURES.iter().enumerate() {
        if let Ok(mut current) = gesture.lock() {
            *current = class;
        }
        let report = teach_loop.tick().await?;
        match report.prediction {
            Some(prediction) => {
                let mark = if prediction.label == ClassIndex(class) { "✓" } else { "✗" };
                println!(
                    "{} Showing {:<9} -> class {} ({:.0}% confident)",
                    mark,
                    name,
                    prediction.label,
                    prediction.confidence(prediction.label).unwrap_or(0.0) * 100.0
                );
            }
            None => println!("✗ Showing {:<9} -> no prediction", name),
        }
    }

    println!("\nFinal class info:");
    for row in teach_loop.store().class_info(None) {
        println!("  Class {}: {}", row.class, row.text());
    }

    Ok(())
}
