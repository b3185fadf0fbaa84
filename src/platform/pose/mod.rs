// Pose estimation platform integration
// Provides the estimator bridge and its backends

pub mod posenet_bridge;

pub use posenet_bridge::{create_pose_estimator, NullPoseEstimator, PoseEstimator};
