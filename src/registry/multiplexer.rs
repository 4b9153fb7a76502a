//! Broadcast multiplexer
//!
//! Fans the values of one resource connection out to a changing set of
//! subscriber queues.
//!
//! ```text
//!              subscribe()                      unsubscribe() of last
//!   ┌──────┐  (first subscriber)  ┌────────┐   (producer cancelled)   ┌──────┐
//!   │ Idle │ ───────────────────► │ Active │ ───────────────────────► │ Idle │
//!   └──────┘                      └────────┘                          └──────┘
//!                                     │   upstream ended / failed
//!                                     └─────► Idle (all queues closed)
//! ```
//!
//! The subscriber set and the producer state live behind one mutex and are
//! always changed together. Every start bumps a generation number; values
//! and termination reports from an older generation are ignored, so a
//! connection that is still winding down can never touch subscribers that
//! joined after it was cancelled.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use super::config::{OverflowPolicy, RegistryConfig};
use super::connection::{ResourceConnection, Termination};
use super::key::ResourceKey;
use super::subscription::{CloseReason, Subscription};

/// Identifier of a subscriber within one multiplexer
pub type SubscriberId = u64;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexerState {
    /// No subscribers, no upstream connection
    Idle,
    /// At least one subscriber, upstream connection running
    Active,
}

/// Statistics for a multiplexer
#[derive(Debug, Clone)]
pub struct MultiplexerStats {
    /// Number of current subscribers
    pub subscriber_count: usize,
    /// Current lifecycle state
    pub state: MultiplexerState,
    /// Upstream connections started over the multiplexer's lifetime
    pub connections_started: u64,
    /// Values fanned out to subscribers
    pub values_delivered: u64,
    /// Subscribers dropped for falling behind
    pub slow_consumers_dropped: u64,
    /// Time spent idle so far (None while active)
    pub idle_for: Option<Duration>,
}

enum ProducerState {
    Idle {
        since: Instant,
    },
    Active {
        generation: u64,
        cancel: CancellationToken,
    },
}

struct Subscriber<T> {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<T>>,
    reason: Arc<OnceLock<CloseReason>>,
}

impl<T> Subscriber<T> {
    /// Record why the queue ends; dropping `self` closes it
    fn close(self, reason: CloseReason) {
        let _ = self.reason.set(reason);
    }
}

struct Inner<T> {
    subscribers: Vec<Subscriber<T>>,
    producer: ProducerState,
    next_id: SubscriberId,
    generation: u64,
    connections_started: u64,
    values_delivered: u64,
    slow_consumers_dropped: u64,
}

impl<T> Inner<T> {
    fn is_current(&self, generation: u64) -> bool {
        matches!(self.producer, ProducerState::Active { generation: g, .. } if g == generation)
    }

    /// Switch to idle, cancelling the running producer if any
    fn go_idle(&mut self) {
        let previous = std::mem::replace(
            &mut self.producer,
            ProducerState::Idle {
                since: Instant::now(),
            },
        );

        match previous {
            ProducerState::Active { cancel, .. } => cancel.cancel(),
            // Keep the earlier idle timestamp
            idle @ ProducerState::Idle { .. } => self.producer = idle,
        }
    }
}

/// Fan-out point for one resource key
pub struct Multiplexer<T> {
    connection: ResourceConnection<T>,
    capacity: usize,
    overflow: OverflowPolicy,
    inner: Mutex<Inner<T>>,
}

impl<T> Multiplexer<T> {
    /// Create an idle multiplexer for `connection`
    pub fn new(connection: ResourceConnection<T>, config: &RegistryConfig) -> Self {
        Self {
            connection,
            capacity: config.subscriber_capacity.max(1),
            overflow: config.overflow_policy,
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                producer: ProducerState::Idle {
                    since: Instant::now(),
                },
                next_id: 1,
                generation: 0,
                connections_started: 0,
                values_delivered: 0,
                slow_consumers_dropped: 0,
            }),
        }
    }

    /// Resource key served by this multiplexer
    pub fn key(&self) -> &ResourceKey {
        self.connection.key()
    }

    // A panic while holding the lock cannot leave the set half-updated in a
    // way later calls can't handle, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a subscriber and close its queue
    ///
    /// Cancels the upstream connection when the last subscriber leaves.
    /// Returns false (and logs a warning) if the id is not subscribed, e.g.
    /// because the subscriber was already dropped for being too slow.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.lock();

        let Some(pos) = inner.subscribers.iter().position(|s| s.id == id) else {
            tracing::warn!(key = %self.key(), subscriber = id, "Unsubscribe for unknown subscriber");
            return false;
        };

        // `remove` keeps the set order for the remaining subscribers
        inner.subscribers.remove(pos).close(CloseReason::Unsubscribed);

        if inner.subscribers.is_empty() {
            tracing::info!(key = %self.key(), "Last subscriber left, cancelling upstream connection");
            inner.go_idle();
        } else {
            tracing::debug!(
                key = %self.key(),
                subscriber = id,
                subscribers = inner.subscribers.len(),
                "Subscriber removed"
            );
        }

        true
    }

    /// Current lifecycle state
    pub fn state(&self) -> MultiplexerState {
        match self.lock().producer {
            ProducerState::Idle { .. } => MultiplexerState::Idle,
            ProducerState::Active { .. } => MultiplexerState::Active,
        }
    }

    /// Number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Whether the multiplexer has been idle for longer than `timeout`
    pub fn idle_longer_than(&self, timeout: Duration) -> bool {
        match self.lock().producer {
            ProducerState::Idle { since } => since.elapsed() > timeout,
            ProducerState::Active { .. } => false,
        }
    }

    /// Snapshot of the multiplexer's counters
    pub fn stats(&self) -> MultiplexerStats {
        let inner = self.lock();
        let (state, idle_for) = match inner.producer {
            ProducerState::Idle { since } => (MultiplexerState::Idle, Some(since.elapsed())),
            ProducerState::Active { .. } => (MultiplexerState::Active, None),
        };

        MultiplexerStats {
            subscriber_count: inner.subscribers.len(),
            state,
            connections_started: inner.connections_started,
            values_delivered: inner.values_delivered,
            slow_consumers_dropped: inner.slow_consumers_dropped,
            idle_for,
        }
    }

    /// Cancel the upstream connection and close every subscriber queue
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.go_idle();
        for sub in inner.subscribers.drain(..) {
            sub.close(CloseReason::Shutdown);
        }
    }

    /// Deliver one value to every current subscriber, in set order
    async fn notify(&self, generation: u64, value: T) {
        let value = Arc::new(value);

        let waiting = {
            let mut inner = self.lock();
            if !inner.is_current(generation) {
                tracing::trace!(key = %self.key(), generation = generation, "Dropping value from stale connection");
                return;
            }
            inner.values_delivered += 1;

            match self.overflow {
                OverflowPolicy::Disconnect => {
                    self.offer(&mut inner, &value);
                    return;
                }
                OverflowPolicy::Wait => inner
                    .subscribers
                    .iter()
                    .map(|s| (s.id, s.tx.clone()))
                    .collect::<Vec<_>>(),
            }
        };

        // Sent outside the lock so a stalled reader can still unsubscribe
        for (id, tx) in waiting {
            if tx.send(Arc::clone(&value)).await.is_err() {
                tracing::debug!(key = %self.key(), subscriber = id, "Subscriber left during delivery");
            }
        }
    }

    /// Non-blocking delivery; full queues get their subscriber dropped
    fn offer(&self, inner: &mut Inner<T>, value: &Arc<T>) {
        let key = self.key();
        let mut dropped = 0;

        inner.subscribers.retain(|sub| match sub.tx.try_send(Arc::clone(value)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let _ = sub.reason.set(CloseReason::SlowConsumer);
                tracing::warn!(key = %key, subscriber = sub.id, "Dropping slow consumer");
                dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                let _ = sub.reason.set(CloseReason::Unsubscribed);
                tracing::debug!(key = %key, subscriber = sub.id, "Subscriber queue already closed");
                false
            }
        });

        inner.slow_consumers_dropped += dropped;

        if inner.subscribers.is_empty() {
            tracing::info!(key = %key, "No subscribers left after delivery, cancelling upstream connection");
            inner.go_idle();
        }
    }

    /// Handle the end of a producer run (exactly once per run)
    fn on_producer_finished(&self, generation: u64, termination: Termination) {
        let mut inner = self.lock();

        if !inner.is_current(generation) {
            tracing::debug!(
                key = %self.key(),
                generation = generation,
                termination = ?termination,
                "Cancelled upstream connection finished"
            );
            return;
        }

        let reason = match &termination {
            Termination::EndOfStream => {
                tracing::info!(
                    key = %self.key(),
                    subscribers = inner.subscribers.len(),
                    "Upstream ended, closing subscribers"
                );
                CloseReason::UpstreamEnded
            }
            Termination::Failed(e) => {
                tracing::warn!(
                    key = %self.key(),
                    subscribers = inner.subscribers.len(),
                    error = %e,
                    "Upstream connection failed, closing subscribers"
                );
                if e.is_not_found() {
                    CloseReason::NotFound
                } else {
                    CloseReason::UpstreamFailed
                }
            }
            Termination::Cancelled => CloseReason::Shutdown,
        };

        inner.go_idle();
        for sub in inner.subscribers.drain(..) {
            sub.close(reason);
        }
    }
}

impl<T: Send + Sync + 'static> Multiplexer<T> {
    /// Add a subscriber queue, starting the upstream connection if idle
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(self: &Arc<Self>) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let reason = Arc::new(OnceLock::new());

        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            tx,
            reason: Arc::clone(&reason),
        });

        if let ProducerState::Idle { .. } = inner.producer {
            inner.generation += 1;
            inner.connections_started += 1;
            let generation = inner.generation;
            let cancel = CancellationToken::new();
            inner.producer = ProducerState::Active {
                generation,
                cancel: cancel.clone(),
            };

            tracing::info!(
                key = %self.key(),
                subscriber = id,
                generation = generation,
                "First subscriber, starting upstream connection"
            );
            self.spawn_producer(generation, cancel);
        } else {
            tracing::debug!(
                key = %self.key(),
                subscriber = id,
                subscribers = inner.subscribers.len(),
                "Subscriber added"
            );
        }
        drop(inner);

        Subscription::new(id, rx, reason, Arc::clone(self))
    }

    fn spawn_producer(self: &Arc<Self>, generation: u64, cancel: CancellationToken) {
        let mux = Arc::clone(self);

        tokio::spawn(async move {
            let termination = mux
                .connection
                .run(cancel, |value| mux.notify(generation, value))
                .await;
            mux.on_producer_finished(generation, termination);
        });
    }
}
