use serde::Serialize;

use crate::{
    geometry::Point2D,
    reps::{RepState, Stage},
};

/// Metrics derived from one frame with a valid detection.
///
/// Serialized field names match the `pose_data` event consumed by the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub angle: f32,
    pub reps: u32,
    pub stage: Stage,
    pub shoulder_x: f32,
    pub shoulder_y: f32,
    pub elbow_x: f32,
    pub elbow_y: f32,
    pub wrist_x: f32,
    pub wrist_y: f32,
}

impl MetricsSnapshot {
    pub fn new(
        angle: f32,
        state: RepState,
        shoulder: Point2D,
        elbow: Point2D,
        wrist: Point2D,
    ) -> Self {
        Self {
            angle,
            reps: state.count,
            stage: state.stage,
            shoulder_x: shoulder.x,
            shoulder_y: shoulder.y,
            elbow_x: elbow.x,
            elbow_y: elbow.y,
            wrist_x: wrist.x,
            wrist_y: wrist.y,
        }
    }
}
