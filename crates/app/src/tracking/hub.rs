use pose_core::MetricsSnapshot;
use tokio::sync::broadcast;

pub(crate) const METRICS_CHANNEL_CAPACITY: usize = 16;

/// Fan-out of metrics snapshots to every connected subscriber.
///
/// Publishing never blocks: slow subscribers lag and skip ahead instead of
/// holding back the tracking loop, and a subscriber only sees snapshots sent
/// after it subscribed.
#[derive(Clone)]
pub(crate) struct MetricsHub {
    tx: broadcast::Sender<MetricsSnapshot>,
}

impl Default for MetricsHub {
    fn default() -> Self {
        Self::new(METRICS_CHANNEL_CAPACITY)
    }
}

impl MetricsHub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers the snapshot was handed to.
    pub(crate) fn publish(&self, snapshot: MetricsSnapshot) -> usize {
        self.tx.send(snapshot).unwrap_or(0)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<MetricsSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}
