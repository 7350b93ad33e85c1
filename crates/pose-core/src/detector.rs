use anyhow::Result;
use image::RgbImage;

use crate::landmarks::LandmarkSet;

/// Single-person landmark detector.
///
/// Implementations return `Ok(None)` when no person is found in the image.
/// Errors are reserved for the model itself failing; callers treat both the
/// same way for a single frame.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>>;

    fn name(&self) -> &str;
}

/// Detector that never finds anyone. Used when no model is configured so the
/// video feed still works.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl LandmarkDetector for NullDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<LandmarkSet>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "none"
    }
}
