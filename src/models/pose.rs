// Data models for single-person pose estimation

use serde::{Deserialize, Serialize};

// ==============================================================================
// Body Parts (17 keypoints)
// ==============================================================================

/// Number of keypoints produced by the pose model for one person
pub const KEYPOINT_COUNT: usize = 17;

/// Body part identifiers in the pose model's fixed output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPart {
    pub const ALL: [BodyPart; KEYPOINT_COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEye => "leftEye",
            BodyPart::RightEye => "rightEye",
            BodyPart::LeftEar => "leftEar",
            BodyPart::RightEar => "rightEar",
            BodyPart::LeftShoulder => "leftShoulder",
            BodyPart::RightShoulder => "rightShoulder",
            BodyPart::LeftElbow => "leftElbow",
            BodyPart::RightElbow => "rightElbow",
            BodyPart::LeftWrist => "leftWrist",
            BodyPart::RightWrist => "rightWrist",
            BodyPart::LeftHip => "leftHip",
            BodyPart::RightHip => "rightHip",
            BodyPart::LeftKnee => "leftKnee",
            BodyPart::RightKnee => "rightKnee",
            BodyPart::LeftAnkle => "leftAnkle",
            BodyPart::RightAnkle => "rightAnkle",
        }
    }
}

/// Bone connections drawn in the skeleton overlay
pub const SKELETON: [(BodyPart, BodyPart); 12] = [
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftElbow),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::RightShoulder, BodyPart::RightElbow),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
];

// ==============================================================================
// Keypoints and Poses
// ==============================================================================

/// A 2D keypoint with confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: BodyPart,
    pub score: f32, // Detection confidence [0, 1]
    pub x: f32,     // Pixel coordinates in frame space
    pub y: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, score: f32, x: f32, y: f32) -> Self {
        Self { part, score, x, y }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// One detected person: overall score plus keypoints in model order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// The "no detection" pose: every keypoint present with zero confidence.
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            keypoints: BodyPart::ALL
                .iter()
                .map(|part| Keypoint::new(*part, 0.0, 0.0, 0.0))
                .collect(),
        }
    }

    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.part == part)
    }

    /// Mean keypoint score, used when the model gives no overall score
    pub fn mean_keypoint_score(&self) -> f32 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        self.keypoints.iter().map(|kp| kp.score).sum::<f32>() / self.keypoints.len() as f32
    }
}

// ==============================================================================
// Estimation Parameters
// ==============================================================================

/// Per-call parameters handed to the pose estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateParams {
    pub min_confidence: f32, // Detection confidence threshold (default: 0.5)
    pub flip_horizontal: bool,
    pub output_stride: u32, // Model search stride (default: 16)
}

impl Default for EstimateParams {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            flip_horizontal: true,
            output_stride: 16,
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose estimator not initialized")]
    NotInitialized,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Expected {expected} keypoints, estimator returned {actual}")]
    KeypointCountMismatch { expected: usize, actual: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

pub type PoseResult<T> = Result<T, PoseError>;
