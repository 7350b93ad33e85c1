//! OpenCV-backed camera capture.

use std::{thread, time::Duration};

use chrono::Utc;
use crossbeam_channel::{Sender, bounded};
use opencv::{
    core::{self, MatTraitConstManual},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait},
};
use tracing::{debug, warn};

use crate::{
    source::ChannelSource,
    types::{CaptureError, Frame, FrameFormat},
};

/// Open `uri` on a dedicated capture thread and wait for the device to come up.
///
/// The open result is reported back before this returns, so a missing camera
/// surfaces as [`CaptureError::Open`] to the caller instead of an idle stream.
pub fn spawn_camera_reader(
    uri: &str,
    target_size: (i32, i32),
    read_timeout: Duration,
) -> Result<ChannelSource, CaptureError> {
    let (tx, rx) = bounded(2);
    let (init_tx, init_rx) = bounded::<Result<(), CaptureError>>(1);
    let thread_uri = uri.to_string();

    let worker = thread::Builder::new()
        .name("camera-capture".into())
        .spawn(move || {
            let cap = match open_video_capture(&thread_uri) {
                Ok(cap) => cap,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            if init_tx.send(Ok(())).is_err() {
                return;
            }
            drop(init_tx);
            capture_loop(cap, target_size, tx);
        })
        .map_err(|err| CaptureError::Other(err.into()))?;

    match init_rx.recv() {
        Ok(Ok(())) => Ok(ChannelSource::new(uri, rx, read_timeout).with_worker(worker)),
        Ok(Err(err)) => {
            let _ = worker.join();
            Err(err)
        }
        Err(_) => {
            let _ = worker.join();
            Err(CaptureError::Open {
                uri: uri.to_string(),
            })
        }
    }
}

fn capture_loop(
    mut cap: VideoCapture,
    target_size: (i32, i32),
    tx: Sender<Result<Frame, CaptureError>>,
) {
    configure_camera(&mut cap, target_size, 30.0);

    let mut frame = Mat::default();
    let mut scratch = Mat::default();
    let (target_w, target_h) = target_size;

    loop {
        let next = match read_frame(&mut cap, &mut frame, &mut scratch, target_w, target_h) {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(CaptureError::EmptyFrame),
            Err(err) => Err(err),
        };
        if tx.send(next).is_err() {
            break;
        }
    }

    debug!("camera capture loop exiting; releasing device");
    let _ = cap.release();
}

fn read_frame(
    cap: &mut VideoCapture,
    frame: &mut Mat,
    scratch: &mut Mat,
    target_w: i32,
    target_h: i32,
) -> Result<Option<Frame>, CaptureError> {
    let grabbed = cap
        .read(frame)
        .map_err(|e| CaptureError::Other(e.into()))?;
    let size = frame.size().map_err(|e| CaptureError::Other(e.into()))?;
    if !grabbed || size.width <= 0 {
        return Ok(None);
    }

    let working = if size.width != target_w || size.height != target_h {
        opencv::imgproc::resize(
            &*frame,
            scratch,
            core::Size {
                width: target_w,
                height: target_h,
            },
            0.0,
            0.0,
            opencv::imgproc::INTER_LINEAR,
        )
        .map_err(|e| CaptureError::Other(e.into()))?;
        &*scratch
    } else {
        &*frame
    };

    let data = working
        .data_bytes()
        .map_err(|e| CaptureError::Other(e.into()))?
        .to_vec();

    Ok(Some(Frame {
        data,
        width: target_w,
        height: target_h,
        timestamp_ms: Utc::now().timestamp_millis(),
        format: FrameFormat::Bgr8,
    }))
}

pub(crate) fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    uri.strip_prefix("/dev/video")
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .and_then(|rest| rest.parse::<i32>().ok())
}

fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
    if let Some(index) = parse_device_index(uri) {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(index, backend) {
                Ok(cap) => {
                    if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                        return Ok(cap);
                    }
                }
                Err(err) => {
                    warn!("failed to open camera #{index} with backend {backend}: {err}");
                }
            }
        }
    }

    match VideoCapture::from_file(uri, videoio::CAP_ANY) {
        Ok(cap) if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? => {
            return Ok(cap);
        }
        Ok(_) => {}
        Err(err) => warn!("failed to open {uri}: {err}"),
    }

    Err(CaptureError::Open {
        uri: uri.to_string(),
    })
}

fn configure_camera(cap: &mut VideoCapture, target_size: (i32, i32), fps: f64) {
    let _ = cap.set(videoio::CAP_PROP_FRAME_WIDTH, target_size.0 as f64);
    let _ = cap.set(videoio::CAP_PROP_FRAME_HEIGHT, target_size.1 as f64);
    let _ = cap.set(videoio::CAP_PROP_FPS, fps);
}
