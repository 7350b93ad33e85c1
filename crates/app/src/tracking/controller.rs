//! Start/stop control for the tracking session.
//!
//! The controller is the only place that spawns or cancels a session; at most
//! one session runs at a time.

use std::{
    io,
    sync::{Arc, Mutex, MutexGuard},
    thread::JoinHandle,
    time::Duration,
};

use anyhow::Result;
use pose_core::{LandmarkDetector, NullDetector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use video_ingest::{CaptureError, FrameSource, open_source};

use crate::{
    config::{CaptureSettings, DetectorSettings, TrackerConfig},
    telemetry,
    tracking::{
        hub::MetricsHub,
        session::{SessionSummary, TrackingSession},
        slot::FrameSlot,
    },
};

/// Builds the per-session collaborators.
pub(crate) trait SessionFactory: Send + Sync {
    fn open_source(&self) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn build_detector(&self) -> Result<Box<dyn LandmarkDetector>>;
}

/// Factory driven by the command-line configuration.
pub(crate) struct DefaultSessionFactory {
    capture: CaptureSettings,
    detector: DetectorSettings,
}

impl DefaultSessionFactory {
    pub(crate) fn new(config: &TrackerConfig) -> Self {
        Self {
            capture: config.capture.clone(),
            detector: config.detector.clone(),
        }
    }
}

impl SessionFactory for DefaultSessionFactory {
    fn open_source(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        open_source(
            &self.capture.uri,
            (self.capture.width, self.capture.height),
            self.capture.read_timeout,
        )
    }

    #[cfg(feature = "with-tch")]
    fn build_detector(&self) -> Result<Box<dyn LandmarkDetector>> {
        use anyhow::Context;
        use pose_core::{
            TorchPoseDetector,
            tch::{Cuda, Device},
        };

        let Some(path) = self.detector.model_path.as_ref() else {
            warn!("No pose model configured; frames will stream without landmarks");
            return Ok(Box::new(NullDetector));
        };
        let device = if self.detector.use_cpu || !Cuda::is_available() {
            Device::Cpu
        } else {
            Device::Cuda(0)
        };
        let size = self.detector.input_size;
        let detector = TorchPoseDetector::new(path, device, (size, size))
            .with_context(|| format!("Failed to load pose model {}", path.display()))?
            .with_min_confidence(self.detector.min_confidence);
        info!("Loaded pose model {} on {:?}", path.display(), detector.device());
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "with-tch"))]
    fn build_detector(&self) -> Result<Box<dyn LandmarkDetector>> {
        if let Some(path) = self.detector.model_path.as_ref() {
            warn!(
                "Ignoring pose model {}: built without the `with-tch` feature",
                path.display()
            );
        } else {
            warn!("No pose model configured; frames will stream without landmarks");
        }
        Ok(Box::new(NullDetector))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartOutcome {
    Started,
    AlreadyRunning,
    /// A stop arrived while the device was still opening.
    Cancelled,
}

impl StartOutcome {
    pub(crate) fn message(self) -> &'static str {
        match self {
            StartOutcome::Started => "Pose tracking started",
            StartOutcome::AlreadyRunning => "Pose tracking already running",
            StartOutcome::Cancelled => "Pose tracking start cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopOutcome {
    Stopped,
    NotRunning,
}

impl StopOutcome {
    pub(crate) fn message(self) -> &'static str {
        match self {
            StopOutcome::Stopped => "Tracking stopped",
            StopOutcome::NotRunning => "Tracking not running",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("capture device unavailable")]
    DeviceUnavailable(#[source] CaptureError),
    #[error("failed to initialise pose detector: {0:#}")]
    Detector(anyhow::Error),
    #[error("failed to spawn tracking thread")]
    Spawn(#[source] io::Error),
    #[error("session controller state poisoned")]
    Poisoned,
}

struct ActiveSession {
    cancel: CancellationToken,
    handle: JoinHandle<SessionSummary>,
}

impl ActiveSession {
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    fn join(self) -> Option<SessionSummary> {
        match self.handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                warn!("Tracking thread panicked");
                None
            }
        }
    }
}

/// Controller bookkeeping. Only ever locked briefly: device opens and joins
/// happen outside the lock.
#[derive(Default)]
struct ControllerState {
    /// Session whose device is still opening, tagged with its start attempt.
    starting: Option<(u64, CancellationToken)>,
    attempts: u64,
    session: Option<ActiveSession>,
}

impl ControllerState {
    fn is_running(&self) -> bool {
        self.starting.is_some() || self.session.as_ref().is_some_and(ActiveSession::is_running)
    }
}

pub(crate) struct SessionController {
    factory: Arc<dyn SessionFactory>,
    frames: FrameSlot,
    metrics: MetricsHub,
    retry_backoff: Duration,
    state: Mutex<ControllerState>,
}

impl SessionController {
    pub(crate) fn new(factory: Arc<dyn SessionFactory>, retry_backoff: Duration) -> Self {
        Self {
            factory,
            frames: FrameSlot::new(),
            metrics: MetricsHub::default(),
            retry_backoff,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub(crate) fn frames(&self) -> &FrameSlot {
        &self.frames
    }

    pub(crate) fn metrics(&self) -> &MetricsHub {
        &self.metrics
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// True while a session is opening its device or running.
    pub(crate) fn is_running(&self) -> bool {
        self.lock_state().is_running()
    }

    /// Open the device and spawn a fresh session unless one is already running.
    ///
    /// Blocks while a previously stopped session finishes its current
    /// iteration and while the device opens; neither holds the state lock, so
    /// `stop` and `is_running` answer immediately in the meantime.
    pub(crate) fn start(&self) -> Result<StartOutcome, SessionError> {
        let cancel = CancellationToken::new();
        let (attempt, previous) = {
            let mut state = self.state.lock().map_err(|_| SessionError::Poisoned)?;
            if state.is_running() {
                return Ok(StartOutcome::AlreadyRunning);
            }
            state.attempts += 1;
            let attempt = state.attempts;
            state.starting = Some((attempt, cancel.clone()));
            (attempt, state.session.take())
        };
        if let Some(previous) = previous {
            previous.cancel.cancel();
            previous.join();
        }

        let opened = self
            .factory
            .open_source()
            .map_err(SessionError::DeviceUnavailable)
            .and_then(|source| {
                let detector = self.factory.build_detector().map_err(SessionError::Detector)?;
                Ok((source, detector))
            });

        let mut state = self.lock_state();
        // A stop may have cleared this attempt and a newer start taken its place.
        if state.starting.as_ref().is_some_and(|(id, _)| *id == attempt) {
            state.starting = None;
        }
        let (source, detector) = opened?;
        if cancel.is_cancelled() {
            info!("Pose tracking start cancelled while opening the device");
            return Ok(StartOutcome::Cancelled);
        }

        let session = TrackingSession::new(
            source,
            detector,
            self.frames.clone(),
            self.metrics.clone(),
            cancel.clone(),
            self.retry_backoff,
        );
        let handle = telemetry::spawn_thread("pose-tracking", move || session.run())
            .map_err(SessionError::Spawn)?;
        state.session = Some(ActiveSession { cancel, handle });
        metrics::gauge!("pose_tracking_active").set(1.0);
        info!("Pose tracking started");
        Ok(StartOutcome::Started)
    }

    /// Signal the running or opening session to stop without waiting for it.
    pub(crate) fn stop(&self) -> StopOutcome {
        let mut state = self.lock_state();
        if let Some((_, opening)) = state.starting.take() {
            opening.cancel();
            info!("Pose tracking stop requested while opening the device");
            return StopOutcome::Stopped;
        }
        match state.session.as_ref() {
            Some(session) if session.is_running() => {
                session.cancel.cancel();
                metrics::gauge!("pose_tracking_active").set(0.0);
                info!("Pose tracking stop requested");
                StopOutcome::Stopped
            }
            _ => StopOutcome::NotRunning,
        }
    }

    /// Stop the session, if any, and wait for its thread to exit.
    pub(crate) fn shutdown(&self) -> Option<SessionSummary> {
        let previous = {
            let mut state = self.lock_state();
            if let Some((_, opening)) = state.starting.take() {
                opening.cancel();
            }
            state.session.take()
        }?;
        previous.cancel.cancel();
        metrics::gauge!("pose_tracking_active").set(0.0);
        previous.join()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
