// Feature extraction - turns one camera frame into a fixed-length pose vector

use crate::models::capture::VideoFrame;
use crate::models::classifier::FeatureVector;
use crate::models::pose::{EstimateParams, Pose, PoseError, PoseResult};
use crate::platform::pose::PoseEstimator;

/// Output of one extraction: the vector for the classifier and the pose for the overlay
#[derive(Debug, Clone)]
pub struct Extraction {
    pub vector: FeatureVector,
    pub pose: Pose,
}

/// Runs the pose estimator with fixed parameters and flattens the result
pub struct FeatureExtractor {
    estimator: Box<dyn PoseEstimator>,
    params: EstimateParams,
}

impl FeatureExtractor {
    pub fn new(estimator: Box<dyn PoseEstimator>, params: EstimateParams) -> Self {
        Self { estimator, params }
    }

    /// Length of every vector this extractor produces
    pub fn feature_len(&self) -> usize {
        self.estimator.keypoint_count() * 3
    }

    pub fn params(&self) -> &EstimateParams {
        &self.params
    }

    pub fn model_info(&self) -> String {
        self.estimator.get_model_info()
    }

    /// Estimate a pose in `frame` and flatten it to `(score, x, y)` triples.
    ///
    /// No caching: every call runs the estimator. A pose whose keypoint count
    /// differs from the estimator's declared count is rejected so stored vectors
    /// stay comparable.
    pub async fn extract(&self, frame: &VideoFrame) -> PoseResult<Extraction> {
        let pose = self.estimator.estimate(frame, &self.params).await?;

        let expected = self.estimator.keypoint_count();
        if pose.keypoints.len() != expected {
            return Err(PoseError::KeypointCountMismatch {
                expected,
                actual: pose.keypoints.len(),
            });
        }

        let vector = FeatureVector::from_pose(&pose);
        Ok(Extraction { vector, pose })
    }
}
