// Request lifecycle notifications delivered to the caller of request_admission

use crate::domain::QueueError;
use tokio::sync::mpsc;

/// Lifecycle event for one admitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// The request now holds a concurrency slot. Sent exactly once, for
    /// immediate grants and promotions alike.
    Started { started_at: i64 },
    /// The request left without a completion report
    Rejected(QueueError),
}

/// Receiving side of a request's notifications.
///
/// The channel closes once the request leaves the manager; after a normal
/// `report_completion` no `Rejected` event is sent.
#[derive(Debug)]
pub struct RequestEvents {
    rx: mpsc::UnboundedReceiver<RequestEvent>,
}

impl RequestEvents {
    /// Wait for the next event, `None` once the request is gone
    pub async fn next(&mut self) -> Option<RequestEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll
    pub fn try_next(&mut self) -> Option<RequestEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait until the request is allowed to run.
    ///
    /// A channel closed before `Started` means the manager was dropped and is
    /// reported as `Cancelled`.
    pub async fn started(&mut self) -> Result<i64, QueueError> {
        match self.rx.recv().await {
            Some(RequestEvent::Started { started_at }) => Ok(started_at),
            Some(RequestEvent::Rejected(err)) => Err(err),
            None => Err(QueueError::Cancelled),
        }
    }

    /// Wait for a rejection, skipping `Started`. `None` when the request
    /// finished normally.
    pub async fn rejection(&mut self) -> Option<QueueError> {
        while let Some(event) = self.rx.recv().await {
            if let RequestEvent::Rejected(err) = event {
                return Some(err);
            }
        }
        None
    }
}

/// Sending side, stored with the waiting/active entry
#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    tx: mpsc::UnboundedSender<RequestEvent>,
}

impl EventSender {
    // A dropped receiver means the caller stopped listening; nothing to do.
    pub(crate) fn started(&self, started_at: i64) {
        let _ = self.tx.send(RequestEvent::Started { started_at });
    }

    pub(crate) fn reject(&self, err: QueueError) {
        let _ = self.tx.send(RequestEvent::Rejected(err));
    }
}

pub(crate) fn event_channel() -> (EventSender, RequestEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, RequestEvents { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_started_then_closed() {
        let (tx, mut events) = event_channel();
        tx.started(1234);
        drop(tx);

        assert_eq!(events.started().await, Ok(1234));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_started_reports_rejection() {
        let (tx, mut events) = event_channel();
        tx.reject(QueueError::QueueCleared);

        assert_eq!(events.started().await, Err(QueueError::QueueCleared));
    }

    #[tokio::test]
    async fn test_rejection_skips_started() {
        let (tx, mut events) = event_channel();
        tx.started(1);
        tx.reject(QueueError::Timeout { timeout_ms: 50 });

        assert_eq!(
            events.rejection().await,
            Some(QueueError::Timeout { timeout_ms: 50 })
        );
    }

    #[tokio::test]
    async fn test_closed_without_start_is_cancelled() {
        let (tx, mut events) = event_channel();
        drop(tx);
        assert_eq!(events.started().await, Err(QueueError::Cancelled));
    }

    #[test]
    fn test_started_pending_until_signalled() {
        let (tx, mut events) = event_channel();
        let mut started = tokio_test::task::spawn(events.started());

        tokio_test::assert_pending!(started.poll());
        tx.started(42);
        assert!(started.is_woken());
        assert_eq!(tokio_test::assert_ready!(started.poll()), Ok(42));
    }

    #[test]
    fn test_try_next_without_runtime() {
        let (tx, mut events) = event_channel();
        assert_eq!(events.try_next(), None);
        tx.started(7);
        assert_eq!(events.try_next(), Some(RequestEvent::Started { started_at: 7 }));
    }
}
