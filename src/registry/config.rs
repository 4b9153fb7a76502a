//! Registry configuration

use std::time::Duration;

/// What a multiplexer does when a subscriber's queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the lagging subscriber and close its queue (`CloseReason::SlowConsumer`)
    Disconnect,
    /// Wait for room in every queue before delivering the next value
    ///
    /// A stalled reader holds up every other subscriber of the same key
    /// until it drains its queue or unsubscribes.
    Wait,
}

/// Configuration shared by a registry and its multiplexers
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each subscriber queue
    pub subscriber_capacity: usize,

    /// Behavior when a subscriber queue is full
    pub overflow_policy: OverflowPolicy,

    /// Remove multiplexers that stayed idle longer than this (None = keep forever)
    pub idle_timeout: Option<Duration>,

    /// How often the reclaim task scans for idle multiplexers
    pub reclaim_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 16,
            overflow_policy: OverflowPolicy::Disconnect,
            idle_timeout: None,
            reclaim_interval: Duration::from_secs(60),
        }
    }
}

impl RegistryConfig {
    /// Set subscriber queue capacity (at least 1)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Enable reclaiming of idle multiplexers
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the reclaim scan interval
    pub fn reclaim_interval(mut self, interval: Duration) -> Self {
        self.reclaim_interval = interval;
        self
    }
}
