//! Subscriber handles
//!
//! A [`Subscription`] is the read side of one subscriber queue. Dropping it
//! (or calling [`Subscription::unsubscribe`]) removes the queue from its
//! multiplexer exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use super::key::ResourceKey;
use super::multiplexer::{Multiplexer, SubscriberId};

/// Why a subscriber queue was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The subscriber unsubscribed itself
    Unsubscribed,
    /// Upstream ended the stream
    UpstreamEnded,
    /// Upstream connection failed to open or broke mid-stream
    UpstreamFailed,
    /// Upstream has no such resource
    NotFound,
    /// The subscriber fell too far behind and was dropped
    SlowConsumer,
    /// The multiplexer was shut down
    Shutdown,
}

/// Outcome of waiting for the next value
#[derive(Debug)]
pub enum Delivery<T> {
    /// A new value arrived
    Value(Arc<T>),
    /// The queue was closed; no more values will arrive
    Closed(CloseReason),
    /// The caller's own cancellation fired first
    Cancelled,
}

/// Read side of a subscriber queue
pub struct Subscription<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<T>>,
    reason: Arc<OnceLock<CloseReason>>,
    mux: Arc<Multiplexer<T>>,
    registered: bool,
}

impl<T> Subscription<T> {
    pub(super) fn new(
        id: SubscriberId,
        rx: mpsc::Receiver<Arc<T>>,
        reason: Arc<OnceLock<CloseReason>>,
        mux: Arc<Multiplexer<T>>,
    ) -> Self {
        Self {
            id,
            rx,
            reason,
            mux,
            registered: true,
        }
    }

    /// Subscriber id within its multiplexer
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Resource this subscription reads
    pub fn key(&self) -> &ResourceKey {
        self.mux.key()
    }

    /// Wait for the next value; `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.rx.recv().await
    }

    /// Wait for the next value or for `cancelled`, whichever comes first
    ///
    /// This is the request loop's suspension point: `cancelled` is usually
    /// the client-disconnect signal of the request being served.
    pub async fn recv_or_cancel<F>(&mut self, cancelled: F) -> Delivery<T>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => Delivery::Cancelled,
            value = self.rx.recv() => match value {
                Some(value) => Delivery::Value(value),
                None => Delivery::Closed(self.close_reason().unwrap_or(CloseReason::UpstreamEnded)),
            },
        }
    }

    /// Why the queue was closed, if it has been
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Leave the multiplexer
    ///
    /// Equivalent to dropping the subscription.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.registered, false) {
            return;
        }

        // Already removed by the multiplexer (upstream closed, slow consumer...)
        if self.reason.get().is_some() {
            return;
        }

        self.mux.unsubscribe(self.id);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", self.mux.key())
            .field("close_reason", &self.close_reason())
            .finish()
    }
}
