//! Channel-backed telemetry publisher shared by run tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::TelemetryEvent;

/// Sender half feeding the SSE response.
///
/// A failed send means the subscriber went away. The publisher then flips
/// its `closed` flag, which workers poll before starting a new cycle, and
/// every later emit becomes a silent no-op. The flag only ever moves
/// false to true.
#[derive(Clone)]
pub struct TelemetryPublisher {
    tx: mpsc::Sender<TelemetryEvent>,
    closed: Arc<AtomicBool>,
}

impl TelemetryPublisher {
    pub fn new(tx: mpsc::Sender<TelemetryEvent>) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the subscriber has disconnected.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Deliver an event, waiting for channel capacity. Used for events
    /// that must not be dropped while the client is connected (open,
    /// log, summary).
    pub async fn send(&self, event: TelemetryEvent) {
        if self.is_closed() {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.mark_closed();
        }
    }

    /// Best-effort delivery for high-frequency events (ping, progress).
    /// A full channel drops the event rather than slowing the run.
    pub fn try_send(&self, event: TelemetryEvent) {
        if self.is_closed() {
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => self.mark_closed(),
        }
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!("telemetry subscriber disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_after_subscriber_drop_marks_closed_and_goes_silent() {
        let (tx, rx) = mpsc::channel(4);
        let publisher = TelemetryPublisher::new(tx);
        drop(rx);

        assert!(!publisher.is_closed());
        publisher.send(TelemetryEvent::ping()).await;
        assert!(publisher.is_closed());

        // every later emit is a no-op
        publisher.try_send(TelemetryEvent::ping());
        publisher.send(TelemetryEvent::ping()).await;
    }

    #[tokio::test]
    async fn try_send_drops_on_full_channel_without_closing() {
        let (tx, mut rx) = mpsc::channel(1);
        let publisher = TelemetryPublisher::new(tx);

        publisher.try_send(TelemetryEvent::ping());
        publisher.try_send(TelemetryEvent::ping());
        assert!(!publisher.is_closed());

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
