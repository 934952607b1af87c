//! Event emitter abstraction for decoupling the session from delivery.
//!
//! The session depends on the [`EventEmitter`] trait rather than a concrete
//! callback or channel, so consumers pick how notifications reach them.

use tokio::sync::mpsc;

use super::StreamEvent;

/// Trait for emitting session events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// let (emitter, mut events) = ChannelEventEmitter::new();
/// let session = StreamSession::connect(url, settings, Arc::new(emitter)).await?;
/// while let Some(event) = events.recv().await { /* ... */ }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a stream event.
    fn emit(&self, event: StreamEvent);
}

/// No-op emitter for callers that poll session state instead.
///
/// Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: StreamEvent) {
        // No-op
    }
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: StreamEvent) {
        tracing::debug!(?event, "stream_event");
    }
}

/// Emitter that forwards events into an unbounded channel.
///
/// Delivery is lossless and in emission order. Events sent after the
/// receiver is dropped are discarded.
pub struct ChannelEventEmitter {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelEventEmitter {
    /// Creates an emitter and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventEmitter for ChannelEventEmitter {
    fn emit(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("[Events] Receiver dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        count: AtomicUsize,
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit(&self, _event: StreamEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter {
            count: AtomicUsize::new(0),
        });
        let dyn_emitter: Arc<dyn EventEmitter> = emitter.clone();

        dyn_emitter.emit(StreamEvent::Reconnected { timestamp: 0 });
        dyn_emitter.emit(StreamEvent::Reconnected { timestamp: 1 });

        assert_eq!(emitter.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn channel_emitter_preserves_order() {
        let (emitter, mut rx) = ChannelEventEmitter::new();
        for timestamp in 0..3 {
            emitter.emit(StreamEvent::Reconnected { timestamp });
        }
        for expected in 0..3 {
            assert_eq!(
                rx.try_recv().unwrap(),
                StreamEvent::Reconnected {
                    timestamp: expected
                }
            );
        }
    }

    #[test]
    fn channel_emitter_survives_dropped_receiver() {
        let (emitter, rx) = ChannelEventEmitter::new();
        drop(rx);
        emitter.emit(StreamEvent::Reconnected { timestamp: 0 });
    }
}
