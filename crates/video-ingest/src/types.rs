use anyhow::Error;
use thiserror::Error;

/// Raw interleaved 8-bit frame captured from a video source.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

impl Frame {
    /// Byte length a `width`x`height` frame in `format` must have.
    pub fn expected_len(width: i32, height: i32, format: FrameFormat) -> usize {
        (width.max(0) as usize) * (height.max(0) as usize) * format.channels()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
    Rgb8,
}

impl FrameFormat {
    pub fn channels(self) -> usize {
        match self {
            FrameFormat::Bgr8 | FrameFormat::Rgb8 => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("video source {uri:?} requires a capture backend that was not compiled in")]
    Unsupported { uri: String },
    #[error("capture device returned an empty frame")]
    EmptyFrame,
    #[error("capture worker disconnected")]
    Disconnected,
    #[error(transparent)]
    Other(#[from] Error),
}
