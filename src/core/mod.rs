pub mod config;
pub mod ml_models;

// Capability seams
pub mod camera;
pub mod display;
pub mod knn;

// Teaching pipeline
pub mod feature_extractor;
pub mod frame_rate;
pub mod label_store;
pub mod teach_loop;
