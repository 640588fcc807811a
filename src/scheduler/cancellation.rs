//! The cancellation lane (§4.1): a separate, never-blocked path from
//! cancel notifications to the in-flight request they target.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A handle a running handler can poll or await to learn it has been
/// cancelled. Cheap to clone; cancellation is a one-way latch.
#[derive(Clone)]
pub struct CancellationToken(Arc<Inner>);

impl CancellationToken {
    fn new() -> Self {
        Self(Arc::new(Inner { cancelled: AtomicBool::new(false), notify: Notify::new() }))
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancelled. Registers for notification before
    /// checking the flag, so a `cancel()` racing with this call is
    /// never missed.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Maps in-flight request ids to their cancellation token, with the
/// bookkeeping needed to honor a cancel that arrives before the
/// handler has published its handle (§4.1).
///
/// `queue` lets a handler claim the token for "whichever request I am"
/// without knowing its own wire id: the transport-level sniffer (see
/// `scheduler::intercept`) publishes a token the moment it reads a
/// request frame, in wire order, and the scheduler claims them in that
/// same order when it starts running the matching handler.
#[derive(Default)]
pub struct CancellationLane {
    in_flight: DashMap<i64, CancellationToken>,
    queue: Mutex<VecDeque<(i64, CancellationToken)>>,
    early_cancels: DashMap<i64, ()>,
    replied: DashMap<i64, ()>,
}

impl CancellationLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once a request's handler starts running. If a cancel for
    /// this id already arrived, the returned token is pre-cancelled.
    pub fn publish(&self, request_id: i64) -> CancellationToken {
        let token = CancellationToken::new();
        if self.early_cancels.remove(&request_id).is_some() {
            token.cancel();
        }
        self.in_flight.insert(request_id, token.clone());
        self.queue.lock().push_back((request_id, token.clone()));
        token
    }

    /// Pops the next published token in wire order. Returns `None` if
    /// nothing has been published yet (e.g. a notification, which has
    /// no wire id and so is never pushed here).
    pub fn claim_next(&self) -> Option<(i64, CancellationToken)> {
        self.queue.lock().pop_front()
    }

    /// Called once a request has replied; later cancels for this id are
    /// dropped with a log entry rather than silently accepted.
    pub fn complete(&self, request_id: i64) {
        self.in_flight.remove(&request_id);
        self.early_cancels.remove(&request_id);
        self.replied.insert(request_id, ());
    }

    pub fn cancel(&self, request_id: i64) {
        if let Some((_, token)) = self.in_flight.remove(&request_id) {
            token.cancel();
            return;
        }
        if self.replied.contains_key(&request_id) {
            warn!(request_id, "cancel for a request that already replied; dropped");
        } else {
            self.early_cancels.insert(request_id, ());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_before_publish_is_still_honored() {
        let lane = CancellationLane::new();
        lane.cancel(42);
        let token = lane.publish(42);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_after_reply_is_dropped() {
        let lane = CancellationLane::new();
        let token = lane.publish(7);
        lane.complete(7);
        lane.cancel(7);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let lane = CancellationLane::new();
        let token = lane.publish(1);
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        lane.cancel(1);
        handle.await.unwrap();
    }

    #[test]
    fn claim_next_pops_in_publish_order() {
        let lane = CancellationLane::new();
        lane.publish(1);
        lane.publish(2);
        assert_eq!(lane.claim_next().unwrap().0, 1);
        assert_eq!(lane.claim_next().unwrap().0, 2);
        assert!(lane.claim_next().is_none());
    }
}
