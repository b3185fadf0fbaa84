pub mod core;
pub mod models;
pub mod platform;

use crate::core::config::Config;
use crate::core::feature_extractor::FeatureExtractor;
use crate::core::knn::create_knn_classifier;
use crate::core::label_store::LabelStore;
use crate::core::ml_models::{ModelInfo, ModelManager};
use crate::core::teach_loop::TeachLoop;
use crate::platform::camera::ImageSequenceCamera;
use crate::platform::controls::spawn_stdin_controls;
use crate::platform::display::CanvasSurface;
use crate::platform::pose::create_pose_estimator;
use anyhow::Context;
use log::{info, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Everything the binary collects from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Config file; the per-user settings file when absent
    pub config_path: Option<PathBuf>,
    /// Directory of still images played back as the camera
    pub frames_dir: PathBuf,
    /// Pose model as a local path or http(s) URL
    pub model: Option<String>,
    /// Write the rendered canvas here every tick
    pub snapshot: Option<PathBuf>,
    /// Dataset loaded at startup (if present) and saved on exit
    pub dataset: Option<PathBuf>,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
}

/// Run one teaching session until `quit`, ctrl-c or the tick limit
pub async fn run(options: RunOptions) -> anyhow::Result<()> {
    let config = match &options.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    config.validate()?;

    let model_path = match &options.model {
        Some(location) => {
            let manager = ModelManager::new(config.model_cache_dir.clone())?;
            let model = ModelInfo::from_location(location);
            Some(manager.ensure_model(&model).await?)
        }
        None => None,
    };
    let estimator = create_pose_estimator(model_path.as_deref())?;
    let extractor = FeatureExtractor::new(estimator, config.estimate_params());

    let session_id = uuid::Uuid::new_v4().to_string();
    info!("Starting teaching session {}", session_id);

    let mut store = LabelStore::new(create_knn_classifier(), &config).with_session_id(session_id);
    if let Some(path) = options.dataset.as_deref().filter(|p| p.exists()) {
        let added = store
            .load_dataset(path)
            .with_context(|| format!("Failed to load dataset {}", path.display()))?;
        info!("Restored {} examples from {}", added, path.display());
    }

    let mut surface = CanvasSurface::new(config.frame_width, config.frame_height);
    if let Some(path) = options.snapshot.clone() {
        surface = surface.with_snapshot(path);
    }

    let camera = ImageSequenceCamera::new(
        options.frames_dir.clone(),
        config.frame_width,
        config.frame_height,
    );

    let (tx, rx) = mpsc::channel(32);
    // Detached: a pending stdin read must not keep the process alive
    let _controls = spawn_stdin_controls(tx).context("Failed to start stdin controls")?;

    let mut teach_loop = TeachLoop::start(config, &camera, extractor, store, Box::new(surface), rx)
        .await
        .context("Teaching session could not start")?;
    teach_loop.set_tick_limit(options.max_ticks);

    tokio::select! {
        _ = teach_loop.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Interrupted");
        }
    }

    let counts = teach_loop.store().example_count_per_class();
    info!("Session ended after {} ticks with examples {:?}", teach_loop.ticks(), counts);

    if let Some(path) = &options.dataset {
        teach_loop
            .store()
            .save_dataset(path)
            .with_context(|| format!("Failed to save dataset {}", path.display()))?;
        info!("Saved dataset to {}", path.display());
    }

    Ok(())
}
