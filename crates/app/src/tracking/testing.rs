//! Test doubles shared by the tracking and server tests.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use image::RgbImage;
use pose_core::{BodyLandmark, LandmarkDetector, LandmarkSet, Point2D};
use tokio::sync::broadcast::{self, error::TryRecvError};
use video_ingest::{CaptureError, Frame, FrameFormat, FrameSource};

use crate::tracking::controller::SessionFactory;

/// Landmarks whose left elbow is bent to exactly `angle_deg`.
pub(crate) fn arm_pose(angle_deg: f32) -> LandmarkSet {
    let elbow = Point2D::new(0.5, 0.5);
    let shoulder = Point2D::new(0.5, 0.3);
    let direction = (angle_deg - 90.0).to_radians();
    let wrist = Point2D::new(
        elbow.x + 0.2 * direction.cos(),
        elbow.y + 0.2 * direction.sin(),
    );
    LandmarkSet::new()
        .with(BodyLandmark::LeftShoulder, shoulder)
        .with(BodyLandmark::LeftElbow, elbow)
        .with(BodyLandmark::LeftWrist, wrist)
}

pub(crate) fn stub_frame(width: i32, height: i32) -> Frame {
    Frame {
        data: vec![64; Frame::expected_len(width, height, FrameFormat::Bgr8)],
        width,
        height,
        timestamp_ms: 0,
        format: FrameFormat::Bgr8,
    }
}

/// Detector that replays a fixed list of elbow angles, cycling forever.
pub(crate) struct ScriptedDetector {
    angles: Vec<f32>,
    next: usize,
    fail: bool,
}

impl ScriptedDetector {
    pub(crate) fn new(angles: Vec<f32>) -> Self {
        Self {
            angles,
            next: 0,
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            angles: Vec::new(),
            next: 0,
            fail: true,
        }
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<LandmarkSet>> {
        if self.fail {
            return Err(anyhow!("scripted detector failure"));
        }
        if self.angles.is_empty() {
            return Ok(None);
        }
        let angle = self.angles[self.next % self.angles.len()];
        self.next += 1;
        Ok(Some(arm_pose(angle)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Source producing uniform frames at roughly 1 kHz.
pub(crate) struct StubSource {
    width: i32,
    height: i32,
    remaining: Option<usize>,
}

impl StubSource {
    pub(crate) fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            remaining: None,
        }
    }

    /// Source that yields `count` frames and then reports no frame forever.
    pub(crate) fn finite(width: i32, height: i32, count: usize) -> Self {
        Self {
            remaining: Some(count),
            ..Self::new(width, height)
        }
    }
}

impl FrameSource for StubSource {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        thread::sleep(Duration::from_millis(1));
        match self.remaining.as_mut() {
            Some(0) => return Ok(None),
            Some(left) => *left -= 1,
            None => {}
        }
        Ok(Some(stub_frame(self.width, self.height)))
    }

    fn describe(&self) -> String {
        format!("stub://{}x{}", self.width, self.height)
    }
}

/// Factory handing out stub sources and scripted detectors, optionally
/// failing to open the device.
pub(crate) struct StubFactory {
    angles: Vec<f32>,
    device_available: bool,
    open_delay: Duration,
    opened: Arc<AtomicUsize>,
}

impl StubFactory {
    pub(crate) fn new(angles: Vec<f32>) -> Self {
        Self {
            angles,
            device_available: true,
            open_delay: Duration::ZERO,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            device_available: false,
            ..Self::new(Vec::new())
        }
    }

    /// Make every device open block for `delay`, like a slow camera.
    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub(crate) fn opened(&self) -> Arc<AtomicUsize> {
        self.opened.clone()
    }
}

impl SessionFactory for StubFactory {
    fn open_source(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        thread::sleep(self.open_delay);
        if !self.device_available {
            return Err(CaptureError::Open {
                uri: "stub://missing".into(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSource::new(32, 24)))
    }

    fn build_detector(&self) -> Result<Box<dyn LandmarkDetector>> {
        Ok(Box::new(ScriptedDetector::new(self.angles.clone())))
    }
}

/// Poll a broadcast receiver until a value arrives or `timeout` elapses.
pub(crate) fn recv_within<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    timeout: Duration,
) -> Option<T> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(value) => return Some(value),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(1)),
            Err(TryRecvError::Closed) => return None,
        }
    }
    None
}
