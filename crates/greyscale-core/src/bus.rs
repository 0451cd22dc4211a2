//! Notification channels connecting stages.
//!
//! Every notification sent through an [`Outbox`] is counted in a shared
//! [`InFlight`] tracker until the stage that receives it has finished the
//! batch it was part of. Stages emit downstream notifications before their
//! own batch is released, so the count only reaches zero once the whole
//! choreography has gone quiet.
//!
//! Channels are unbounded: they stand in for durable transports, and stages
//! feed each other in a cycle through the stores, where a bounded buffer
//! could deadlock.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::types::BatchReport;

/// Counts notifications that have been sent but not yet fully handled.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of notifications currently queued or being handled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until no notification is queued or being handled.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn acquire(self: &Arc<Self>) -> InFlightGuard {
        self.pending.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }
}

/// Releases one pending notification when dropped.
#[derive(Debug)]
pub struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

struct Delivery<T> {
    item: T,
    guard: InFlightGuard,
}

/// Sending half of a tracked channel.
pub struct Outbox<T> {
    tx: mpsc::UnboundedSender<Delivery<T>>,
    inflight: Arc<InFlight>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T> Outbox<T> {
    /// Queue a notification. Returns `false` if the receiving stage is gone.
    pub fn send(&self, item: T) -> bool {
        let guard = self.inflight.acquire();
        self.tx.send(Delivery { item, guard }).is_ok()
    }
}

/// Receiving half of a tracked channel.
pub struct Inbox<T> {
    rx: mpsc::UnboundedReceiver<Delivery<T>>,
}

/// A batch of notifications, held in flight until dropped.
pub struct Batch<T> {
    pub items: Vec<T>,
    guards: Vec<InFlightGuard>,
}

impl<T> Batch<T> {
    /// Split into items and the guards that keep them counted as in flight.
    pub fn into_parts(self) -> (Vec<T>, Vec<InFlightGuard>) {
        (self.items, self.guards)
    }
}

impl<T> Inbox<T> {
    /// Wait for at least one notification, then take whatever else is
    /// already queued, up to `max`.
    pub async fn recv_batch(&mut self, max: usize) -> Option<Batch<T>> {
        let first = self.rx.recv().await?;
        let mut items = vec![first.item];
        let mut guards = vec![first.guard];
        while items.len() < max.max(1) {
            match self.rx.try_recv() {
                Ok(next) => {
                    items.push(next.item);
                    guards.push(next.guard);
                }
                Err(_) => break,
            }
        }
        Some(Batch { items, guards })
    }
}

/// Create a tracked channel pair counted against `inflight`.
pub fn tracked_channel<T>(inflight: &Arc<InFlight>) -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Outbox {
            tx,
            inflight: Arc::clone(inflight),
        },
        Inbox { rx },
    )
}

/// A stage invocation loop: pulls batches from an inbox and hands each to
/// the stage handler.
pub struct StageRunner<T> {
    name: &'static str,
    inbox: Inbox<T>,
    batch_size: usize,
}

impl<T> StageRunner<T> {
    pub fn new(name: &'static str, inbox: Inbox<T>, batch_size: usize) -> Self {
        Self {
            name,
            inbox,
            batch_size,
        }
    }

    /// Run until every sender is dropped.
    ///
    /// Handlers report their own failures, so nothing here can stop the loop.
    pub async fn run<F, Fut>(mut self, f: F)
    where
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = BatchReport>,
    {
        while let Some(batch) = self.inbox.recv_batch(self.batch_size).await {
            let (items, _guards) = batch.into_parts();
            let received = items.len();
            let report = f(items).await;
            tracing::debug!(
                "{} invocation: {} received, {} succeeded, {} failed",
                self.name,
                received,
                report.succeeded,
                report.failed
            );
        }
        tracing::debug!("{} stage stopped", self.name);
    }
}
