// Data models for camera frames, pose estimation, classification and session state

pub mod capture;
pub mod classifier;
pub mod pose;
pub mod session;
