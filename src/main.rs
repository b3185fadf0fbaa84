use clap::Parser;
use pose_teach_lib::RunOptions;
use std::path::PathBuf;

/// Teach a three-class gesture classifier from camera frames.
///
/// Type `press N` while showing a gesture to record examples for class N,
/// `release` to stop, `clear N` / `clear` to forget examples, `quit` to exit.
#[derive(Parser, Debug)]
#[command(name = "pose-teach", version, about)]
struct Cli {
    /// Config file (defaults to ~/.pose_teach/config/settings.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory of frames played back as the camera
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,

    /// PoseNet ONNX model as a local path or http(s) URL
    #[arg(long, value_name = "PATH_OR_URL")]
    model: Option<String>,

    /// Write the rendered canvas to this PNG every tick
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Dataset JSON restored at startup and saved on exit
    #[arg(long, value_name = "PATH")]
    dataset: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    pose_teach_lib::run(RunOptions {
        config_path: cli.config,
        frames_dir: cli.frames,
        model: cli.model,
        snapshot: cli.snapshot,
        dataset: cli.dataset,
        max_ticks: cli.max_ticks,
    })
    .await
}
