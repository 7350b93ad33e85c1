//! Hysteresis counter turning a per-frame joint angle into completed repetitions.

use serde::{Serialize, Serializer};

/// Angle above which the joint counts as extended.
pub const DOWN_THRESHOLD_DEG: f32 = 160.0;
/// Angle below which an extended joint counts as flexed, completing a rep.
pub const UP_THRESHOLD_DEG: f32 = 30.0;

/// Half of the movement that was observed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    None,
    Down,
    Up,
}

impl Stage {
    pub fn label(self) -> Option<&'static str> {
        match self {
            Stage::None => None,
            Stage::Down => Some("down"),
            Stage::Up => Some("up"),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.label() {
            Some(label) => serializer.serialize_str(label),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepState {
    pub stage: Stage,
    pub count: u32,
}

/// Outcome of feeding one angle into the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepEvent {
    Unchanged,
    Extended,
    Completed(u32),
}

#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    state: RepState,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RepState::default();
    }

    pub fn update(&mut self, angle: f32) -> RepEvent {
        if angle > DOWN_THRESHOLD_DEG {
            let was_down = self.state.stage == Stage::Down;
            self.state.stage = Stage::Down;
            if was_down {
                RepEvent::Unchanged
            } else {
                RepEvent::Extended
            }
        } else if angle < UP_THRESHOLD_DEG && self.state.stage == Stage::Down {
            self.state.stage = Stage::Up;
            self.state.count = self.state.count.saturating_add(1);
            RepEvent::Completed(self.state.count)
        } else {
            RepEvent::Unchanged
        }
    }
}
