//! Single-subscriber event streams

use crate::metrics as m;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use visionbridge_core::Detection;

/// The three output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    PredictionResults,
    InferenceTime,
    FpsRate,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [Self::PredictionResults, Self::InferenceTime, Self::FpsRate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PredictionResults => "prediction_results",
            Self::InferenceTime => "inference_time",
            Self::FpsRate => "fps_rate",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown stream '{}'", s))
    }
}

struct Subscriber<T> {
    id: u64,
    sender: mpsc::Sender<T>,
}

/// Delivers values to at most one attached subscriber
///
/// Nothing is buffered on the producer side: a value sunk with no subscriber
/// attached, or while the subscriber's queue is full, is dropped.
pub struct StreamBroadcaster<T> {
    kind: StreamKind,
    capacity: usize,
    subscriber: Mutex<Option<Subscriber<T>>>,
    next_id: AtomicU64,
}

impl<T: Send + 'static> StreamBroadcaster<T> {
    pub fn new(kind: StreamKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            subscriber: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Attach a new subscriber, replacing any previous one
    pub fn attach(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let replaced = self.subscriber.lock().replace(Subscriber { id, sender });
        if let Some(old) = replaced {
            tracing::debug!(stream = %self.kind, old = old.id, new = id, "Subscriber replaced");
        } else {
            tracing::debug!(stream = %self.kind, id, "Subscriber attached");
        }

        Subscription { id, receiver }
    }

    /// Detach whatever subscriber is attached
    pub fn detach(&self) {
        if let Some(old) = self.subscriber.lock().take() {
            tracing::debug!(stream = %self.kind, id = old.id, "Subscriber detached");
        }
    }

    /// Detach only if `id` is still the attached subscriber
    ///
    /// Returns false when a later attach already replaced it.
    pub fn detach_if_current(&self, id: u64) -> bool {
        let mut slot = self.subscriber.lock();
        if slot.as_ref().map_or(false, |s| s.id == id) {
            *slot = None;
            tracing::debug!(stream = %self.kind, id, "Subscriber detached");
            true
        } else {
            false
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscriber.lock().is_some()
    }

    /// Deliver a value to the attached subscriber without blocking
    ///
    /// Returns whether the value was handed over.
    pub fn sink(&self, value: T) -> bool {
        let mut slot = self.subscriber.lock();
        let Some(subscriber) = slot.as_ref() else {
            m::stream_value(self.kind, false);
            return false;
        };

        let delivered = match subscriber.sender.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!(stream = %self.kind, "Subscriber lagging, value dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(stream = %self.kind, id = subscriber.id, "Subscriber gone, detaching");
                *slot = None;
                false
            }
        };

        m::stream_value(self.kind, delivered);
        delivered
    }
}

/// Receiving end handed to the host when it attaches
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Identifies this attachment for [`StreamBroadcaster::detach_if_current`]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next value; `None` once detached and drained
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next value if one is ready
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// The prediction, inference-time and fps streams
pub struct EventStreams {
    pub predictions: StreamBroadcaster<Vec<Detection>>,
    pub inference_time: StreamBroadcaster<f64>,
    pub fps_rate: StreamBroadcaster<f64>,
}

impl EventStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            predictions: StreamBroadcaster::new(StreamKind::PredictionResults, capacity),
            inference_time: StreamBroadcaster::new(StreamKind::InferenceTime, capacity),
            fps_rate: StreamBroadcaster::new(StreamKind::FpsRate, capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_without_subscriber_drops() {
        let stream = StreamBroadcaster::<f64>::new(StreamKind::FpsRate, 4);
        assert!(!stream.sink(1.0));

        let mut sub = stream.attach();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_delivery_is_fifo() {
        let stream = StreamBroadcaster::new(StreamKind::InferenceTime, 8);
        let mut sub = stream.attach();

        for v in [1.0, 2.0, 3.0] {
            assert!(stream.sink(v));
        }
        assert_eq!(sub.drain(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_attach_replaces_previous() {
        let stream = StreamBroadcaster::new(StreamKind::FpsRate, 4);
        let mut first = stream.attach();
        let mut second = stream.attach();

        stream.sink(30.0);
        assert!(first.try_recv().is_none());
        assert_eq!(second.try_recv(), Some(30.0));
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let stream = StreamBroadcaster::new(StreamKind::FpsRate, 2);
        let mut sub = stream.attach();

        assert!(stream.sink(1.0));
        assert!(stream.sink(2.0));
        assert!(!stream.sink(3.0));
        assert_eq!(sub.drain(), vec![1.0, 2.0]);
        assert!(stream.is_attached());
    }

    #[test]
    fn test_dropped_subscription_detaches_on_next_sink() {
        let stream = StreamBroadcaster::new(StreamKind::FpsRate, 2);
        drop(stream.attach());

        assert!(stream.is_attached());
        assert!(!stream.sink(1.0));
        assert!(!stream.is_attached());
    }

    #[test]
    fn test_stale_detach_keeps_replacement() {
        let stream = StreamBroadcaster::<f64>::new(StreamKind::InferenceTime, 2);
        let old = stream.attach();
        let new = stream.attach();

        assert!(!stream.detach_if_current(old.id()));
        assert!(stream.is_attached());
        assert!(stream.detach_if_current(new.id()));
        assert!(!stream.is_attached());
    }

    #[test]
    fn test_stream_kind_parse() {
        assert_eq!("fps_rate".parse::<StreamKind>(), Ok(StreamKind::FpsRate));
        assert!("frames".parse::<StreamKind>().is_err());
    }
}
