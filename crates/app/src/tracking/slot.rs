use std::sync::{Arc, Mutex, OnceLock};

use actix_web::web::Bytes;
use anyhow::Result;
use image::RgbImage;

use crate::tracking::annotation::encode_jpeg;

/// Frame stored in the slot. Immutable once published.
pub(crate) struct SlotFrame {
    pub(crate) sequence: u64,
    pub(crate) image: RgbImage,
    pub(crate) annotated: bool,
    jpeg: OnceLock<(u8, Bytes)>,
}

impl SlotFrame {
    /// JPEG encoding of the frame, shared by every consumer that asks for the
    /// same quality. Only the first quality requested is cached.
    pub(crate) fn jpeg(&self, quality: u8) -> Result<Bytes> {
        if let Some((cached_quality, jpeg)) = self.jpeg.get() {
            if *cached_quality == quality {
                return Ok(jpeg.clone());
            }
            return encode_jpeg(&self.image, quality).map(Bytes::from);
        }
        let encoded = Bytes::from(encode_jpeg(&self.image, quality)?);
        let (cached_quality, jpeg) = self.jpeg.get_or_init(|| (quality, encoded.clone()));
        if *cached_quality == quality {
            Ok(jpeg.clone())
        } else {
            Ok(encoded)
        }
    }
}

#[derive(Default)]
struct SlotState {
    latest: Option<Arc<SlotFrame>>,
    published: u64,
}

/// Single-slot, newest-wins hand-off between the tracking loop and video consumers.
///
/// Writers replace the whole entry under the lock and readers clone the `Arc`
/// out, so a reader sees either the previous frame or the new one in full.
#[derive(Clone, Default)]
pub(crate) struct FrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl FrameSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame, returning the sequence number it was given.
    pub(crate) fn publish(&self, image: RgbImage, annotated: bool) -> u64 {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.published = guard.published.wrapping_add(1);
        let sequence = guard.published;
        guard.latest = Some(Arc::new(SlotFrame {
            sequence,
            image,
            annotated,
            jpeg: OnceLock::new(),
        }));
        sequence
    }

    pub(crate) fn latest(&self) -> Option<Arc<SlotFrame>> {
        match self.inner.lock() {
            Ok(guard) => guard.latest.clone(),
            Err(_) => None,
        }
    }

    /// Latest frame only if it is newer than `seen`.
    pub(crate) fn latest_after(&self, seen: Option<u64>) -> Option<Arc<SlotFrame>> {
        self.latest()
            .filter(|frame| seen.is_none_or(|sequence| frame.sequence != sequence))
    }

    pub(crate) fn published(&self) -> u64 {
        match self.inner.lock() {
            Ok(guard) => guard.published,
            Err(_) => 0,
        }
    }
}
