use std::{thread::JoinHandle, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::types::{CaptureError, Frame};

/// A capture device owned by exactly one consumer.
///
/// `read` returns `Ok(None)` when no frame became available in time; the
/// consumer is expected to simply try again. Dropping the source releases the
/// underlying device.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;

    fn describe(&self) -> String;
}

/// Source fed by a background capture thread over a small bounded channel.
///
/// Dropping the receiver makes the worker's next send fail, which ends its
/// loop and releases the device it owns.
pub struct ChannelSource {
    label: String,
    rx: Receiver<Result<Frame, CaptureError>>,
    read_timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl ChannelSource {
    pub fn new(
        label: impl Into<String>,
        rx: Receiver<Result<Frame, CaptureError>>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            rx,
            read_timeout,
            worker: None,
        }
    }

    pub fn with_worker(mut self, worker: JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }
}

impl FrameSource for ChannelSource {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Disconnected),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        // Unblock the worker before joining: a full channel keeps it parked in `send`.
        let (_, closed) = crossbeam_channel::bounded(0);
        drop(std::mem::replace(&mut self.rx, closed));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crossbeam_channel::bounded;

    use super::*;
    use crate::types::FrameFormat;

    fn frame(value: u8) -> Frame {
        Frame {
            data: vec![value; 3],
            width: 1,
            height: 1,
            timestamp_ms: 0,
            format: FrameFormat::Rgb8,
        }
    }

    #[test]
    fn read_forwards_frames_and_errors() {
        let (tx, rx) = bounded(4);
        let mut source = ChannelSource::new("test", rx, Duration::from_millis(50));
        tx.send(Ok(frame(7))).unwrap();
        tx.send(Err(CaptureError::Open { uri: "x".into() })).unwrap();

        let first = source.read().unwrap().expect("frame");
        assert_eq!(first.data, vec![7, 7, 7]);
        assert!(matches!(source.read(), Err(CaptureError::Open { .. })));
    }

    #[test]
    fn read_times_out_with_none() {
        let (_tx, rx) = bounded::<Result<Frame, CaptureError>>(1);
        let mut source = ChannelSource::new("idle", rx, Duration::from_millis(5));
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn read_reports_disconnected_worker() {
        let (tx, rx) = bounded::<Result<Frame, CaptureError>>(1);
        drop(tx);
        let mut source = ChannelSource::new("gone", rx, Duration::from_millis(5));
        assert!(matches!(source.read(), Err(CaptureError::Disconnected)));
    }

    #[test]
    fn drop_stops_a_blocked_worker() {
        let (tx, rx) = bounded(1);
        let worker = thread::spawn(move || {
            let mut value = 0u8;
            while tx.send(Ok(frame(value))).is_ok() {
                value = value.wrapping_add(1);
            }
        });
        let mut source =
            ChannelSource::new("busy", rx, Duration::from_millis(50)).with_worker(worker);
        assert!(source.read().unwrap().is_some());
        drop(source);
    }
}
