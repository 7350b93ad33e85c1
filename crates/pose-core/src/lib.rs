//! Pose primitives shared by the tracking server: landmark geometry, the
//! repetition counter, metrics snapshots, and the detector seam.
//!
//! Enable the `with-tch` feature to pull in the TorchScript detector.

pub mod detector;
pub mod geometry;
pub mod landmarks;
pub mod reps;
pub mod snapshot;

#[cfg(feature = "with-tch")]
pub mod torch;

pub use detector::{LandmarkDetector, NullDetector};
pub use geometry::{Point2D, joint_angle};
pub use landmarks::{BodyLandmark, LandmarkSet, SKELETON};
pub use reps::{RepCounter, RepEvent, RepState, Stage};
pub use snapshot::MetricsSnapshot;

#[cfg(feature = "with-tch")]
pub use tch;
#[cfg(feature = "with-tch")]
pub use torch::TorchPoseDetector;
