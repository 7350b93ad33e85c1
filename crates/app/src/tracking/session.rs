//! The capture → detect → count → publish loop.
//!
//! One `TrackingSession` exists per started session. It owns the capture
//! device and the repetition counter outright, so dropping the session (or
//! returning from [`TrackingSession::run`]) releases the device.

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use pose_core::{LandmarkDetector, MetricsSnapshot, RepCounter, RepEvent, joint_angle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use video_ingest::{Frame, FrameSource};

use crate::tracking::{
    annotation::{draw_hud, draw_skeleton, frame_to_rgb},
    hub::MetricsHub,
    slot::FrameSlot,
};

/// Counters reported when a session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionSummary {
    pub(crate) frames: u64,
    pub(crate) detections: u64,
    pub(crate) read_failures: u64,
    pub(crate) reps: u32,
}

pub(crate) struct TrackingSession {
    source: Box<dyn FrameSource>,
    detector: Box<dyn LandmarkDetector>,
    reps: RepCounter,
    frames: FrameSlot,
    metrics: MetricsHub,
    cancel: CancellationToken,
    retry_backoff: Duration,
    summary: SessionSummary,
}

impl TrackingSession {
    pub(crate) fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        frames: FrameSlot,
        metrics: MetricsHub,
        cancel: CancellationToken,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            source,
            detector,
            reps: RepCounter::new(),
            frames,
            metrics,
            cancel,
            retry_backoff,
            summary: SessionSummary::default(),
        }
    }

    /// Run until the token is cancelled. Cancellation is checked once per iteration.
    pub(crate) fn run(mut self) -> SessionSummary {
        let session_span = tracing::info_span!(
            "tracking.session",
            source = %self.source.describe(),
            detector = self.detector.name()
        );
        let _enter = session_span.enter();
        info!("Tracking session started");

        while !self.cancel.is_cancelled() {
            let read = tracing::info_span!("capture.read").in_scope(|| self.source.read());
            let frame = match read {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.record_read_failure("timeout");
                    continue;
                }
                Err(err) => {
                    debug!("Frame read failed: {err}");
                    self.record_read_failure("error");
                    continue;
                }
            };

            let started = Instant::now();
            let frame_span = tracing::info_span!("frame", index = self.summary.frames);
            if let Err(err) = frame_span.in_scope(|| self.process_frame(&frame)) {
                warn!("Dropping frame: {err:#}");
                metrics::counter!("pose_frame_errors_total").increment(1);
            }
            metrics::histogram!("pose_loop_latency_seconds")
                .record(started.elapsed().as_secs_f64());
        }

        let summary = self.summary;
        drop(self.source);
        info!(
            frames = summary.frames,
            detections = summary.detections,
            read_failures = summary.read_failures,
            reps = summary.reps,
            "Tracking session finished"
        );
        summary
    }

    /// Process a single frame and return the snapshot it produced, if any.
    ///
    /// The frame slot is updated whether or not a person was found.
    pub(crate) fn process_frame(&mut self, frame: &Frame) -> Result<Option<MetricsSnapshot>> {
        let mut image = frame_to_rgb(frame)?;
        self.summary.frames += 1;
        metrics::counter!("pose_frames_total").increment(1);

        let landmarks = match self.detector.detect(&image) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                warn!("Detector {} failed: {err:#}", self.detector.name());
                metrics::counter!("pose_detector_errors_total").increment(1);
                None
            }
        };

        let Some(landmarks) = landmarks else {
            metrics::counter!("pose_detection_misses_total").increment(1);
            self.frames.publish(image, false);
            return Ok(None);
        };

        draw_skeleton(&mut image, &landmarks);

        let Some((shoulder, elbow, wrist)) = landmarks.left_arm() else {
            metrics::counter!("pose_detection_misses_total").increment(1);
            self.frames.publish(image, true);
            return Ok(None);
        };

        self.summary.detections += 1;
        let angle = joint_angle(shoulder, elbow, wrist);
        match self.reps.update(angle) {
            RepEvent::Completed(count) => {
                info!(reps = count, angle, "Repetition completed");
                metrics::counter!("pose_reps_total").increment(1);
            }
            RepEvent::Extended => debug!(angle, "Arm extended"),
            RepEvent::Unchanged => {}
        }
        let state = self.reps.state();
        self.summary.reps = state.count;
        metrics::gauge!("pose_elbow_angle_degrees").set(angle as f64);

        let snapshot = MetricsSnapshot::new(angle, state, shoulder, elbow, wrist);
        draw_hud(&mut image, &snapshot);
        self.metrics.publish(snapshot.clone());
        self.frames.publish(image, true);
        Ok(Some(snapshot))
    }

    fn record_read_failure(&mut self, reason: &'static str) {
        self.summary.read_failures += 1;
        metrics::counter!("pose_read_failures_total", "reason" => reason).increment(1);
        thread::sleep(self.retry_backoff);
    }
}
