//! Built-in synthetic source so the pipeline can run without a camera.

use std::{
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;

use crate::{
    source::FrameSource,
    types::{CaptureError, Frame, FrameFormat},
};

pub const SYNTHETIC_SCHEME: &str = "synthetic://";

/// Paced gradient with a sweeping bar, produced at a fixed frame rate.
pub struct TestPatternSource {
    width: i32,
    height: i32,
    frame_interval: Duration,
    next_due: Instant,
    frame_number: u64,
}

impl TestPatternSource {
    pub fn new(target_size: (i32, i32), fps: f64) -> Result<Self, CaptureError> {
        let (width, height) = target_size;
        if width <= 0 || height <= 0 {
            return Err(CaptureError::Open {
                uri: format!("{SYNTHETIC_SCHEME}{width}x{height}"),
            });
        }
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Ok(Self {
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            next_due: Instant::now(),
            frame_number: 0,
        })
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_x = (self.frame_number as usize * 4) % w;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                if x.abs_diff(bar_x) < 3 {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    let r = (x * 255 / w.max(1)) as u8;
                    let g = (y * 255 / h.max(1)) as u8;
                    data.extend_from_slice(&[r, g, 96]);
                }
            }
        }
        data
    }
}

impl FrameSource for TestPatternSource {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        let now = Instant::now();
        if self.next_due > now {
            thread::sleep(self.next_due - now);
        }
        self.next_due = Instant::now() + self.frame_interval;

        let data = self.render();
        self.frame_number = self.frame_number.wrapping_add(1);
        Ok(Some(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Rgb8,
        }))
    }

    fn describe(&self) -> String {
        format!("{SYNTHETIC_SCHEME}{}x{}", self.width, self.height)
    }
}
