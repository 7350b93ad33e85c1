//! Command-line and environment configuration.
//!
//! `TrackerCliArgs` is the raw clap surface; `TrackerConfig` is the validated
//! form the rest of the server consumes.

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::Parser;
use video_ingest::SourceKind;

#[derive(Debug, Parser)]
#[command(
    name = "rep-tracker",
    about = "Live pose tracking server streaming annotated video and repetition metrics"
)]
pub struct TrackerCliArgs {
    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Camera index, device path, media URL, or `synthetic://`.
    #[arg(long = "source", env = "POSE_SOURCE", default_value = "0")]
    pub source: String,
    /// Capture width in pixels.
    #[arg(long, default_value_t = 640)]
    pub width: i32,
    /// Capture height in pixels.
    #[arg(long, default_value_t = 480)]
    pub height: i32,
    /// JPEG quality for the video feed (1-100).
    #[arg(long = "jpeg-quality", default_value_t = 80)]
    pub jpeg_quality: u8,
    /// How often each video consumer polls for a new frame.
    #[arg(long = "stream-interval-ms", default_value_t = 33)]
    pub stream_interval_ms: u64,
    /// Pause after a failed frame read before retrying.
    #[arg(long = "retry-backoff-ms", default_value_t = 5)]
    pub retry_backoff_ms: u64,
    /// How long a single device read may wait for a frame.
    #[arg(long = "read-timeout-ms", default_value_t = 500)]
    pub read_timeout_ms: u64,
    /// TorchScript pose model (requires the `with-tch` feature).
    #[arg(long = "model", env = "POSE_MODEL", value_name = "PATH")]
    pub model: Option<PathBuf>,
    /// Detector input edge length in pixels.
    #[arg(long = "model-input", default_value_t = 192)]
    pub model_input: u32,
    /// Minimum keypoint confidence accepted from the detector.
    #[arg(long = "min-confidence", default_value_t = 0.5)]
    pub min_confidence: f32,
    /// Force CPU inference.
    #[arg(long = "cpu", action = clap::ArgAction::SetTrue)]
    pub use_cpu: bool,
    /// Enable debug logging.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub host: String,
    pub port: u16,
    pub capture: CaptureSettings,
    pub detector: DetectorSettings,
    pub stream: StreamSettings,
    pub retry_backoff: Duration,
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct CaptureSettings {
    pub uri: String,
    pub source_kind: SourceKind,
    pub width: i32,
    pub height: i32,
    pub read_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct DetectorSettings {
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub min_confidence: f32,
    pub use_cpu: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct StreamSettings {
    pub poll_interval: Duration,
    pub jpeg_quality: u8,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(33),
            jpeg_quality: 80,
        }
    }
}

impl TryFrom<TrackerCliArgs> for TrackerConfig {
    type Error = anyhow::Error;

    fn try_from(args: TrackerCliArgs) -> Result<Self> {
        if args.width <= 0 || args.height <= 0 {
            bail!("Capture width and height must be positive integers");
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.stream_interval_ms == 0 {
            bail!("--stream-interval-ms must be at least 1");
        }
        if args.read_timeout_ms == 0 {
            bail!("--read-timeout-ms must be at least 1");
        }
        if args.model_input == 0 {
            bail!("--model-input must be a positive integer");
        }
        if !(0.0..=1.0).contains(&args.min_confidence) {
            bail!("--min-confidence must be between 0 and 1");
        }
        if args.source.trim().is_empty() {
            bail!("--source must not be empty");
        }

        let source_kind = SourceKind::from_uri(&args.source);

        Ok(Self {
            host: args.host,
            port: args.port,
            capture: CaptureSettings {
                uri: args.source,
                source_kind,
                width: args.width,
                height: args.height,
                read_timeout: Duration::from_millis(args.read_timeout_ms),
            },
            detector: DetectorSettings {
                model_path: args.model,
                input_size: args.model_input,
                min_confidence: args.min_confidence,
                use_cpu: args.use_cpu,
            },
            stream: StreamSettings {
                poll_interval: Duration::from_millis(args.stream_interval_ms),
                jpeg_quality: args.jpeg_quality,
            },
            retry_backoff: Duration::from_millis(args.retry_backoff_ms),
            verbose: args.verbose,
        })
    }
}
