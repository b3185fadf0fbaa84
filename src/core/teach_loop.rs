// Control loop - records training examples or predicts a class on every tick

use crate::core::camera::{CameraSource, VideoStream};
use crate::core::config::{Config, ConfigError};
use crate::core::display::DisplaySurface;
use crate::core::feature_extractor::FeatureExtractor;
use crate::core::frame_rate::FrameRateMeter;
use crate::core::label_store::LabelStore;
use crate::models::capture::CaptureError;
use crate::models::classifier::{ClassIndex, ClassifierError};
use crate::models::pose::PoseError;
use crate::models::session::{ControlEvent, SessionMode, SkipReason, TickReport};
use log::{debug, info, warn};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TryRecvError};

#[derive(Debug, thiserror::Error)]
pub enum TeachError {
    #[error("Camera error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Pose estimation error: {0}")]
    Pose(#[from] PoseError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type TeachResult<T> = Result<T, TeachError>;

/// Message shown when the camera cannot be acquired
pub const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "This demo needs a camera. Check that one is connected and that access is allowed.";

/// Owns the session mode, the label store and one camera stream.
/// Ticks run strictly one after another.
pub struct TeachLoop {
    config: Config,
    stream: Box<dyn VideoStream>,
    extractor: FeatureExtractor,
    store: LabelStore,
    display: Box<dyn DisplaySurface>,
    events: mpsc::Receiver<ControlEvent>,
    events_open: bool,
    mode: SessionMode,
    frame_rate: FrameRateMeter,
    ticks: u64,
    tick_limit: Option<u64>,
}

impl TeachLoop {
    /// Acquire the camera and build the loop. Camera failure is the one fatal
    /// startup error: it is shown on `display` and returned, and no tick runs.
    pub async fn start(
        config: Config,
        camera: &dyn CameraSource,
        extractor: FeatureExtractor,
        store: LabelStore,
        mut display: Box<dyn DisplaySurface>,
        events: mpsc::Receiver<ControlEvent>,
    ) -> TeachResult<Self> {
        config.validate()?;

        let stream = match camera.acquire().await {
            Ok(stream) => stream,
            Err(e) => {
                display.show_message(CAMERA_UNAVAILABLE_MESSAGE);
                return Err(e.into());
            }
        };

        info!(
            "Teaching loop ready: {} classes, k={}, camera {}, pose model {}",
            config.num_classes,
            config.top_k,
            camera.describe(),
            extractor.model_info()
        );

        Ok(Self {
            config,
            stream,
            extractor,
            store,
            display,
            events,
            events_open: true,
            mode: SessionMode::Idle,
            frame_rate: FrameRateMeter::default(),
            ticks: 0,
            tick_limit: None,
        })
    }

    /// Stop `run` after this many ticks in total
    pub fn set_tick_limit(&mut self, limit: Option<u64>) {
        self.tick_limit = limit;
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Class button pressed: last press wins
    pub fn press(&mut self, class: ClassIndex) {
        if class.0 >= self.config.num_classes {
            warn!(
                "Ignoring press of class {} (configured classes: {})",
                class, self.config.num_classes
            );
            return;
        }
        self.mode = self.mode.press(class);
        debug!("Recording class {}", class);
    }

    /// Any class button released
    pub fn release(&mut self) {
        self.mode = self.mode.release();
        debug!("Idle");
    }

    /// Apply one control event; returns false on `Quit`
    pub fn apply_event(&mut self, event: ControlEvent) -> bool {
        match event {
            ControlEvent::Press(class) => self.press(class),
            ControlEvent::Release => self.release(),
            ControlEvent::ClearClass(class) => {
                if let Err(e) = self.store.clear_class(class) {
                    warn!("Cannot clear class {}: {}", class, e);
                }
            }
            ControlEvent::ClearAll => self.store.clear_all(),
            ControlEvent::Quit => return false,
        }
        true
    }

    /// Apply queued events; returns false once `Quit` was seen
    fn drain_events(&mut self) -> bool {
        while self.events_open {
            match self.events.try_recv() {
                Ok(event) => {
                    if !self.apply_event(event) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Control channel closed; continuing without input");
                    self.events_open = false;
                }
            }
        }
        true
    }

    /// One tick: draw the mirrored frame, then record and/or predict.
    ///
    /// Features are extracted at most once and shared by both branches; the
    /// vector is dropped when the tick ends, on error paths too.
    pub async fn tick(&mut self) -> TeachResult<TickReport> {
        let started = Instant::now();
        self.ticks += 1;
        let mut report = TickReport::new(self.ticks, self.mode);

        let frame = self.stream.next_frame().await?;
        self.display.draw_frame(&frame, self.config.mirror_display);

        let recording = self.mode.recording_class();
        if recording.is_some() || self.store.class_count() > 0 {
            let extraction = self.extractor.extract(&frame).await?;
            report.extracted = true;

            let low_score = extraction.pose.score < self.config.min_confidence;
            if self.config.skip_low_score_poses && low_score {
                report.skipped = Some(SkipReason::LowPoseScore(extraction.pose.score));
            } else {
                if let Some(class) = recording {
                    self.store.add_example(&extraction.vector, class)?;
                    self.display.overlay_pose(&extraction.pose, self.config.min_confidence);
                    report.recorded = Some(class);
                }

                if self.store.class_count() > 0 {
                    let prediction =
                        self.store.predict(&extraction.vector, self.config.top_k).await?;
                    let rows = self.store.class_info(Some(&prediction));
                    self.display.show_class_info(&rows);
                    report.prediction = Some(prediction);
                }
            }
        }

        // No examples left: counts only, nothing emphasized
        if self.store.class_count() == 0 {
            let rows = self.store.class_info(None);
            self.display.show_class_info(&rows);
        }

        self.display.present();
        self.frame_rate.record(started.elapsed());
        report.fps = self.frame_rate.fps();
        Ok(report)
    }

    /// Drive ticks until `Quit` or the tick limit. A failing tick is logged and
    /// skipped; the next tick is a fresh attempt.
    pub async fn run(&mut self) {
        let interval = self.config.frame_interval();
        info!("Teaching loop running at up to {} FPS", self.config.target_fps);

        loop {
            if !self.drain_events() {
                info!("Quit requested");
                break;
            }
            if self.tick_limit.map_or(false, |limit| self.ticks >= limit) {
                info!("Tick limit of {} reached", self.ticks);
                break;
            }

            let started = Instant::now();
            match self.tick().await {
                Ok(report) => {
                    if report.tick % 100 == 0 {
                        debug!("Tick {}: {:.1} FPS", report.tick, report.fps);
                    }
                }
                Err(e) => warn!("Skipping tick {}: {}", self.ticks, e),
            }

            let elapsed = started.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::knn::InMemoryKnn;
    use crate::models::capture::{CaptureResult, VideoFrame};
    use crate::models::classifier::{ClassInfo, Prediction};
    use crate::models::pose::{BodyPart, EstimateParams, Keypoint, Pose, PoseResult};
    use crate::platform::pose::PoseEstimator;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    // ==========================================================================
    // Deterministic fakes
    // ==========================================================================

    /// Camera whose frames carry a scripted "scene id" in the first pixel
    struct ScriptedCamera {
        scenes: Vec<u8>,
        available: bool,
    }

    struct ScriptedStream {
        scenes: Vec<u8>,
        position: usize,
    }

    #[async_trait]
    impl CameraSource for ScriptedCamera {
        async fn acquire(&self) -> CaptureResult<Box<dyn VideoStream>> {
            if !self.available {
                return Err(CaptureError::CameraUnavailable("permission denied".to_string()));
            }
            Ok(Box::new(ScriptedStream {
                scenes: self.scenes.clone(),
                position: 0,
            }))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[async_trait]
    impl VideoStream for ScriptedStream {
        async fn next_frame(&mut self) -> CaptureResult<VideoFrame> {
            let scene = self.scenes[self.position % self.scenes.len()];
            self.position += 1;
            Ok(VideoFrame::solid(4, 4, [scene, 0, 0, 255]))
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }
    }

    /// Pose depends only on the scene id; scene 255 makes the estimator fail
    struct SceneEstimator {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl PoseEstimator for SceneEstimator {
        async fn estimate(&self, frame: &VideoFrame, _params: &EstimateParams) -> PoseResult<Pose> {
            *self.calls.lock().unwrap() += 1;
            let scene = frame.data[0];
            if scene == 255 {
                return Err(PoseError::InferenceFailed("model crashed".to_string()));
            }
            let score = if scene == 0 { 0.1 } else { 0.9 };
            let keypoints = BodyPart::ALL
                .iter()
                .map(|part| {
                    let angle = scene as f32 * 0.7 + part.index() as f32 * 0.01;
                    Keypoint::new(*part, score, 100.0 * angle.cos(), 100.0 * angle.sin())
                })
                .collect();
            Ok(Pose { score, keypoints })
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> String {
            "scene".to_string()
        }
    }

    #[derive(Default)]
    struct DisplayLog {
        frames: usize,
        overlays: usize,
        rows: Vec<ClassInfo>,
        messages: Vec<String>,
    }

    struct SharedDisplay(Arc<Mutex<DisplayLog>>);

    impl DisplaySurface for SharedDisplay {
        fn draw_frame(&mut self, _frame: &VideoFrame, _mirror: bool) {
            self.0.lock().unwrap().frames += 1;
        }

        fn overlay_pose(&mut self, _pose: &Pose, _min_confidence: f32) {
            self.0.lock().unwrap().overlays += 1;
        }

        fn show_class_info(&mut self, rows: &[ClassInfo]) {
            self.0.lock().unwrap().rows = rows.to_vec();
        }

        fn show_message(&mut self, message: &str) {
            self.0.lock().unwrap().messages.push(message.to_string());
        }
    }

    struct Harness {
        teach_loop: TeachLoop,
        tx: mpsc::Sender<ControlEvent>,
        display: Arc<Mutex<DisplayLog>>,
        calls: Arc<Mutex<usize>>,
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.target_fps = 60;
        config
    }

    async fn harness(config: Config, scenes: Vec<u8>) -> Harness {
        let calls = Arc::new(Mutex::new(0));
        let display = Arc::new(Mutex::new(DisplayLog::default()));
        let (tx, rx) = mpsc::channel(16);

        let extractor = FeatureExtractor::new(
            Box::new(SceneEstimator { calls: calls.clone() }),
            config.estimate_params(),
        );
        let store = LabelStore::new(Box::new(InMemoryKnn::new()), &config);
        let camera = ScriptedCamera { scenes, available: true };

        let teach_loop = TeachLoop::start(
            config,
            &camera,
            extractor,
            store,
            Box::new(SharedDisplay(display.clone())),
            rx,
        )
        .await
        .unwrap();

        Harness { teach_loop, tx, display, calls }
    }

    async fn record(h: &mut Harness, class: usize, ticks: usize) {
        h.teach_loop.press(ClassIndex(class));
        for _ in 0..ticks {
            h.teach_loop.tick().await.unwrap();
        }
        h.teach_loop.release();
    }

    // ==========================================================================
    // Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_camera_unavailable_is_fatal_and_shown() {
        let config = test_config();
        let display = Arc::new(Mutex::new(DisplayLog::default()));
        let (_tx, rx) = mpsc::channel(1);
        let extractor = FeatureExtractor::new(
            Box::new(SceneEstimator { calls: Arc::new(Mutex::new(0)) }),
            config.estimate_params(),
        );
        let store = LabelStore::new(Box::new(InMemoryKnn::new()), &config);
        let camera = ScriptedCamera { scenes: vec![1], available: false };

        let result = TeachLoop::start(
            config,
            &camera,
            extractor,
            store,
            Box::new(SharedDisplay(display.clone())),
            rx,
        )
        .await;

        assert!(matches!(result, Err(TeachError::Capture(CaptureError::CameraUnavailable(_)))));
        let log = display.lock().unwrap();
        assert_eq!(log.messages, vec![CAMERA_UNAVAILABLE_MESSAGE.to_string()]);
        assert_eq!(log.frames, 0);
    }

    #[tokio::test]
    async fn test_clearing_all_examples_resets_class_info() {
        let mut h = harness(test_config(), vec![1]).await;
        record(&mut h, 0, 5).await;
        assert_eq!(h.display.lock().unwrap().rows[0].text(), "5 examples - 100%");

        h.teach_loop.apply_event(ControlEvent::ClearAll);
        let report = h.teach_loop.tick().await.unwrap();
        assert!(report.prediction.is_none());

        let rows = h.display.lock().unwrap().rows.clone();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.text() == "No examples added"));
        assert!(rows.iter().all(|row| !row.emphasized));
    }

    #[tokio::test]
    async fn test_idle_without_examples_skips_extraction() {
        let mut h = harness(test_config(), vec![1]).await;

        let report = h.teach_loop.tick().await.unwrap();
        assert!(!report.extracted);
        assert!(report.prediction.is_none());
        assert_eq!(*h.calls.lock().unwrap(), 0);
        assert_eq!(h.display.lock().unwrap().frames, 1);
    }

    #[tokio::test]
    async fn test_recording_extracts_once_per_tick() {
        let mut h = harness(test_config(), vec![1]).await;
        h.teach_loop.press(ClassIndex(0));

        let report = h.teach_loop.tick().await.unwrap();
        assert_eq!(report.recorded, Some(ClassIndex(0)));
        // Recording and prediction share one extraction
        assert!(report.prediction.is_some());
        assert_eq!(*h.calls.lock().unwrap(), 1);
        assert_eq!(h.display.lock().unwrap().overlays, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_five_three_zero() {
        // Scene 1 for class 0, scene 4 for class 1, then look at scene 1 again
        let mut h = harness(test_config(), vec![1]).await;
        record(&mut h, 0, 5).await;

        h.teach_loop.stream = Box::new(ScriptedStream { scenes: vec![4], position: 0 });
        record(&mut h, 1, 3).await;

        let counts = h.teach_loop.store().example_count_per_class();
        assert_eq!(counts.get(&ClassIndex(0)), Some(&5));
        assert_eq!(counts.get(&ClassIndex(1)), Some(&3));
        assert_eq!(counts.get(&ClassIndex(2)), None);

        h.teach_loop.stream = Box::new(ScriptedStream { scenes: vec![1], position: 0 });
        let report = h.teach_loop.tick().await.unwrap();
        let prediction: Prediction = report.prediction.unwrap();
        assert_eq!(prediction.label, ClassIndex(0));
        assert_eq!(prediction.confidence(ClassIndex(2)), None);

        let sum: f32 = prediction.confidences.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        let rows = h.display.lock().unwrap().rows.clone();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].emphasized);
        assert_eq!(rows[0].text(), "5 examples - 100%");
        assert_eq!(rows[1].text(), "3 examples - 0%");
        assert_eq!(rows[2].confidence, None);
        assert_eq!(rows[2].text(), "No examples added");
    }

    #[tokio::test]
    async fn test_last_press_wins_and_release_clears() {
        let mut h = harness(test_config(), vec![1]).await;

        h.teach_loop.press(ClassIndex(0));
        h.teach_loop.press(ClassIndex(2));
        assert_eq!(h.teach_loop.mode(), SessionMode::Recording(ClassIndex(2)));

        let report = h.teach_loop.tick().await.unwrap();
        assert_eq!(report.recorded, Some(ClassIndex(2)));
        assert_eq!(h.teach_loop.store().example_count(ClassIndex(0)), 0);

        h.teach_loop.apply_event(ControlEvent::Release);
        assert_eq!(h.teach_loop.mode(), SessionMode::Idle);
    }

    #[tokio::test]
    async fn test_press_out_of_range_is_ignored() {
        let mut h = harness(test_config(), vec![1]).await;
        h.teach_loop.press(ClassIndex(7));
        assert_eq!(h.teach_loop.mode(), SessionMode::Idle);
    }

    #[tokio::test]
    async fn test_low_score_pose_is_skipped_when_enabled() {
        let mut config = test_config();
        config.skip_low_score_poses = true;
        let mut h = harness(config, vec![0]).await;

        h.teach_loop.press(ClassIndex(1));
        let report = h.teach_loop.tick().await.unwrap();
        assert!(report.extracted);
        assert!(matches!(report.skipped, Some(SkipReason::LowPoseScore(_))));
        assert_eq!(report.recorded, None);
        assert_eq!(h.teach_loop.store().class_count(), 0);
    }

    #[tokio::test]
    async fn test_estimator_failure_fails_only_that_tick() {
        let mut h = harness(test_config(), vec![255, 1]).await;
        h.teach_loop.press(ClassIndex(0));

        assert!(matches!(h.teach_loop.tick().await, Err(TeachError::Pose(_))));
        let report = h.teach_loop.tick().await.unwrap();
        assert_eq!(report.recorded, Some(ClassIndex(0)));
        assert_eq!(h.teach_loop.store().example_count(ClassIndex(0)), 1);
    }

    #[tokio::test]
    async fn test_run_applies_events_and_survives_failures() {
        let mut h = harness(test_config(), vec![1, 255]).await;

        h.tx.send(ControlEvent::Press(ClassIndex(1))).await.unwrap();
        h.teach_loop.set_tick_limit(Some(4));
        h.teach_loop.run().await;

        assert_eq!(h.teach_loop.ticks(), 4);
        // Scenes alternate 1, 255: two ticks recorded, two failed and were skipped
        assert_eq!(h.teach_loop.store().example_count(ClassIndex(1)), 2);
        assert_eq!(h.teach_loop.mode(), SessionMode::Recording(ClassIndex(1)));

        h.tx.send(ControlEvent::ClearClass(ClassIndex(1))).await.unwrap();
        h.tx.send(ControlEvent::Quit).await.unwrap();
        h.teach_loop.set_tick_limit(None);
        h.teach_loop.run().await;

        assert_eq!(h.teach_loop.ticks(), 4);
        assert_eq!(h.teach_loop.store().class_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_stop_the_loop() {
        let mut h = harness(test_config(), vec![1]).await;
        drop(h.tx);
        h.teach_loop.set_tick_limit(Some(2));
        h.teach_loop.run().await;
        assert_eq!(h.teach_loop.ticks(), 2);
    }
}
