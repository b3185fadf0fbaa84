// Data models for the nearest-neighbour gesture classifier

use crate::models::pose::Pose;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==============================================================================
// Classes and Feature Vectors
// ==============================================================================

/// Index of a trainable class, `0..num_classes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIndex(pub usize);

impl fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flattened `(score, x, y)` triples, one per keypoint in model order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn from_pose(pose: &Pose) -> Self {
        let mut values = Vec::with_capacity(pose.keypoints.len() * 3);
        for keypoint in &pose.keypoints {
            values.push(keypoint.score);
            values.push(keypoint.x);
            values.push(keypoint.y);
        }
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

// ==============================================================================
// Prediction Results
// ==============================================================================

/// Result of a k-nearest-neighbour query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: ClassIndex,
    /// Confidence per class that has stored examples; sums to 1.0
    pub confidences: BTreeMap<ClassIndex, f32>,
}

impl Prediction {
    pub fn confidence(&self, class: ClassIndex) -> Option<f32> {
        self.confidences.get(&class).copied()
    }
}

/// One line of the on-screen class info
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassInfo {
    pub class: ClassIndex,
    pub examples: usize,
    pub confidence: Option<f32>,
    pub emphasized: bool, // Predicted label is rendered bold
}

impl ClassInfo {
    /// Confidence as a percentage rounded to one decimal
    pub fn confidence_percent(&self) -> Option<f32> {
        self.confidence.map(|c| (c * 1000.0).round() / 10.0)
    }

    pub fn text(&self) -> String {
        if self.examples == 0 {
            return "No examples added".to_string();
        }
        match self.confidence_percent() {
            Some(percent) => format!("{} examples - {}%", self.examples, percent),
            None => format!("{} examples", self.examples),
        }
    }
}

// ==============================================================================
// Dataset Export
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetExample {
    pub label: ClassIndex,
    pub vector: FeatureVector,
}

/// Serializable snapshot of every stored training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub session_id: Option<String>,
    pub created_at: i64,
    pub feature_len: usize,
    pub examples: Vec<DatasetExample>,
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("No examples have been added; prediction is not possible")]
    NoExamples,

    #[error("Neighbour count must be at least 1")]
    InvalidK,

    #[error("Class {label} out of range (configured classes: {num_classes})")]
    LabelOutOfRange { label: ClassIndex, num_classes: usize },

    #[error("Feature vector has {actual} values, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Dataset error: {0}")]
    Dataset(String),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;
