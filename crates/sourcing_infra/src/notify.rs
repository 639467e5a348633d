//! Closure notification outbox.
//!
//! `QueuedNotifier` hands notices to a bounded channel with `try_send`, so the
//! desk never waits on a slow delivery path. A separate consumer drains the
//! `NotificationOutbox` and does the actual delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use sourcing_core::notify::{ClosureNotice, ClosureNotifier, NotifyError};

#[derive(Debug, Default)]
pub struct OutboxMetrics {
    enqueued_total: AtomicU64,
    dropped_total: AtomicU64,
}

impl OutboxMetrics {
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }
}

pub struct QueuedNotifier {
    sender: SyncSender<ClosureNotice>,
    metrics: Arc<OutboxMetrics>,
}

pub struct NotificationOutbox {
    receiver: Receiver<ClosureNotice>,
    metrics: Arc<OutboxMetrics>,
}

impl QueuedNotifier {
    /// A notifier and the outbox it feeds, holding at most `capacity` notices.
    pub fn bounded(capacity: usize) -> (QueuedNotifier, NotificationOutbox) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let metrics = Arc::new(OutboxMetrics::default());
        (
            QueuedNotifier {
                sender,
                metrics: Arc::clone(&metrics),
            },
            NotificationOutbox { receiver, metrics },
        )
    }

    pub fn metrics(&self) -> &OutboxMetrics {
        &self.metrics
    }
}

impl ClosureNotifier for QueuedNotifier {
    fn notify_closure(
        &self,
        notice: &ClosureNotice,
        _timeout: Duration,
    ) -> Result<(), NotifyError> {
        match self.sender.try_send(notice.clone()) {
            Ok(()) => {
                self.metrics.enqueued_total.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.dropped_total.fetch_add(1, Ordering::Relaxed);
                Err(NotifyError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.dropped_total.fetch_add(1, Ordering::Relaxed);
                Err(NotifyError::Disconnected)
            }
        }
    }
}

impl NotificationOutbox {
    /// Next notice, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ClosureNotice, NotifyError> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => NotifyError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            },
            RecvTimeoutError::Disconnected => NotifyError::Disconnected,
        })
    }

    /// Every notice currently queued, without waiting.
    pub fn drain(&self) -> Vec<ClosureNotice> {
        self.receiver.try_iter().collect()
    }

    pub fn metrics(&self) -> &OutboxMetrics {
        &self.metrics
    }
}

/// Notifier that only logs. For deployments without a delivery channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ClosureNotifier for LogNotifier {
    fn notify_closure(
        &self,
        notice: &ClosureNotice,
        _timeout: Duration,
    ) -> Result<(), NotifyError> {
        for allocation in &notice.allocations {
            tracing::info!(
                "VendorAwarded rfq={} vendor={} quote={} scheme_a={} scheme_b={}",
                notice.rfq_id,
                allocation.vendor,
                allocation.quote_id,
                allocation.split.a,
                allocation.split.b
            );
        }
        Ok(())
    }
}
