// Sentry Cam CLI binary

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

use sentry_cam::config::Config;
use sentry_cam::constants::DEFAULT_OUTPUT_DIR;
use sentry_cam::detect::{FrameDiffClassifier, MotionClassifier};
use sentry_cam::pipeline::{PipelineController, RunSummary, ShutdownToken};
use sentry_cam::record::encoder::{Encoder, FfmpegEncoder, RawEncoder};
use sentry_cam::source::{FrameSource, RawStreamSource, SyntheticSource};

#[derive(Parser)]
#[command(name = "sentry-cam")]
#[command(about = "Motion-triggered event recorder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a frame stream and record motion events
    Run {
        /// JSON config file (flags below override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for snapshots and clips
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Read raw BGR24 frames from stdin instead of the synthetic source
        #[arg(long)]
        stdin: bool,
        /// Frame width of the stream
        #[arg(long, default_value = "720")]
        width: u32,
        /// Frame height of the stream
        #[arg(long, default_value = "480")]
        height: u32,
        /// Nominal frame rate of the stream (0 = use the fallback)
        #[arg(long, default_value = "0")]
        fps: f64,
        /// Consecutive motion frames required to trigger
        #[arg(long)]
        sustained: Option<u32>,
        /// Seconds of pre-roll kept for clips
        #[arg(long)]
        pre: Option<f64>,
        /// Seconds of post-roll appended to clips
        #[arg(long)]
        post: Option<f64>,
        /// Write raw frame dumps instead of encoding with ffmpeg
        #[arg(long)]
        raw: bool,
    },

    /// List recorded artifacts in the output directory
    List {
        /// Output directory to list
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Maximum artifacts to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            output_dir,
            stdin,
            width,
            height,
            fps,
            sustained,
            pre,
            post,
            raw,
        } => cmd_run(config, output_dir, stdin, width, height, fps, sustained, pre, post, raw),
        Commands::List { output_dir, limit } => cmd_list(output_dir, limit),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    stdin: bool,
    width: u32,
    height: u32,
    fps: f64,
    sustained: Option<u32>,
    pre: Option<f64>,
    post: Option<f64>,
    raw: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(k) = sustained {
        config.sustained_threshold = k;
    }
    if let Some(secs) = pre {
        config.pre_seconds = secs;
    }
    if let Some(secs) = post {
        config.post_seconds = secs;
    }

    let shutdown = ShutdownToken::new();
    let ctrlc_token = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        ctrlc_token.request();
    })?;

    let encoder: Box<dyn Encoder> = if raw {
        Box::new(RawEncoder)
    } else {
        Box::new(FfmpegEncoder::new())
    };
    let classifier = FrameDiffClassifier::new(config.min_region_area);

    let summary = if stdin {
        let source = RawStreamSource::new(std::io::stdin().lock(), width, height, fps);
        start(source, classifier, &config, encoder, shutdown)?
    } else {
        log::info!("no --stdin stream, using the synthetic demo source");
        let source = SyntheticSource::new(width, height, fps, 0);
        start(source, classifier, &config, encoder, shutdown)?
    };

    println!(
        "{} event(s) recorded ({} frames, {} dropped, {} write failures)",
        summary.events_total, summary.frames_processed, summary.dropped_frames, summary.write_failures,
    );
    if let Some(clip) = &summary.last_clip {
        println!("last clip: {}", clip);
    }
    if let Some(snapshot) = &summary.last_snapshot {
        println!("last snapshot: {}", snapshot);
    }
    Ok(())
}

fn start<S: FrameSource, C: MotionClassifier>(
    source: S,
    classifier: C,
    config: &Config,
    encoder: Box<dyn Encoder>,
    shutdown: ShutdownToken,
) -> Result<RunSummary> {
    let controller = PipelineController::new(source, classifier, config, encoder, shutdown)?;
    Ok(controller.run()?)
}

fn cmd_list(output_dir: Option<PathBuf>, limit: usize) -> Result<()> {
    let dir = output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    if !dir.is_dir() {
        anyhow::bail!("no output directory at {}", dir.display());
    }

    let mut entries: Vec<(String, u64)> = WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            (e.file_name().to_string_lossy().into_owned(), size)
        })
        .collect();

    // Timestamp-stem names sort chronologically; newest first.
    entries.sort();
    entries.reverse();

    for (name, size) in entries.iter().take(limit) {
        println!("{:>12}  {}", size, name);
    }
    println!("{} artifact(s) in {}", entries.len(), dir.display());
    Ok(())
}
