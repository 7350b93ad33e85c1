//! Capture sources for the pose tracker.
//!
//! Every source implements [`FrameSource`]: the tracking loop owns it, polls
//! it once per iteration, and drops it to release the device. Sources are
//! selected by URI:
//! - `synthetic://`: paced test pattern, always available.
//! - anything else: a camera index, `/dev/videoN` or a stream URL opened
//!   through OpenCV (requires the `with-opencv` feature).

use std::time::Duration;

#[cfg(feature = "with-opencv")]
mod camera;
mod pattern;
mod source;
mod types;

#[cfg(feature = "with-opencv")]
pub use camera::spawn_camera_reader;
pub use pattern::{SYNTHETIC_SCHEME, TestPatternSource};
pub use source::{ChannelSource, FrameSource};
pub use types::{CaptureError, Frame, FrameFormat};

/// Frame rate of the synthetic source.
pub const SYNTHETIC_FPS: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Camera index, V4L device path, or media URL.
    Device,
    /// Built-in test pattern.
    Synthetic,
}

impl SourceKind {
    pub fn from_uri(uri: &str) -> Self {
        if uri.starts_with(SYNTHETIC_SCHEME) {
            SourceKind::Synthetic
        } else {
            SourceKind::Device
        }
    }
}

/// Open the source named by `uri`, failing fast when the device is unavailable.
///
/// `read_timeout` bounds how long a single `read` waits on a device-backed
/// source before reporting "no frame".
pub fn open_source(
    uri: &str,
    target_size: (i32, i32),
    read_timeout: Duration,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    match SourceKind::from_uri(uri) {
        SourceKind::Synthetic => Ok(Box::new(TestPatternSource::new(
            target_size,
            SYNTHETIC_FPS,
        )?)),
        SourceKind::Device => open_device(uri, target_size, read_timeout),
    }
}

#[cfg(feature = "with-opencv")]
fn open_device(
    uri: &str,
    target_size: (i32, i32),
    read_timeout: Duration,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(spawn_camera_reader(uri, target_size, read_timeout)?))
}

#[cfg(not(feature = "with-opencv"))]
fn open_device(
    uri: &str,
    _target_size: (i32, i32),
    _read_timeout: Duration,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported {
        uri: uri.to_string(),
    })
}
