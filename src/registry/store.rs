//! Resource registry implementation
//!
//! Process-wide map from resource key to multiplexer. Shared by every request
//! so that subscribers of the same key reuse one upstream connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::connection::ResourceConnection;
use super::key::ResourceKey;
use super::multiplexer::{Multiplexer, MultiplexerStats};
use super::subscription::Subscription;

/// Central registry of multiplexers for one value type
///
/// The map has its own `RwLock`, independent of the per-multiplexer locks.
/// Entries are never removed unless an idle timeout is configured.
pub struct ResourceRegistry<T> {
    /// Map of resource key to multiplexer
    entries: RwLock<HashMap<ResourceKey, Arc<Multiplexer<T>>>>,

    /// Configuration
    config: RegistryConfig,
}

impl<T: Send + Sync + 'static> ResourceRegistry<T> {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the multiplexer for `key`, creating it from `factory` if absent
    ///
    /// `factory` only runs when no entry exists yet. While the returned
    /// handle is held the entry is never reclaimed, but prefer
    /// [`subscribe`](Self::subscribe) when an idle timeout is configured.
    pub async fn get_or_create<F>(&self, key: &ResourceKey, factory: F) -> Arc<Multiplexer<T>>
    where
        F: FnOnce() -> ResourceConnection<T>,
    {
        if let Some(mux) = self.entries.read().await.get(key) {
            return Arc::clone(mux);
        }

        let mut entries = self.entries.write().await;
        Arc::clone(self.entry(&mut entries, key, factory))
    }

    /// Subscribe to `key`, creating its multiplexer from `factory` if absent
    ///
    /// The subscription is taken while the map lock is held, so an idle
    /// reclaim can never remove the entry between lookup and subscribe.
    pub async fn subscribe<F>(&self, key: &ResourceKey, factory: F) -> Subscription<T>
    where
        F: FnOnce() -> ResourceConnection<T>,
    {
        {
            let entries = self.entries.read().await;
            if let Some(mux) = entries.get(key) {
                return mux.subscribe();
            }
        }

        let mut entries = self.entries.write().await;
        self.entry(&mut entries, key, factory).subscribe()
    }

    fn entry<'a, F>(
        &self,
        entries: &'a mut HashMap<ResourceKey, Arc<Multiplexer<T>>>,
        key: &ResourceKey,
        factory: F,
    ) -> &'a Arc<Multiplexer<T>>
    where
        F: FnOnce() -> ResourceConnection<T>,
    {
        entries.entry(key.clone()).or_insert_with(|| {
            let connection = factory();
            if connection.key() != key {
                tracing::warn!(
                    key = %key,
                    connection_key = %connection.key(),
                    "Connection key differs from registry key"
                );
            }
            tracing::debug!(key = %key, "Multiplexer created");
            Arc::new(Multiplexer::new(connection, &self.config))
        })
    }

    /// Get the multiplexer for `key` if one exists
    pub async fn get(&self, key: &ResourceKey) -> Option<Arc<Multiplexer<T>>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Get statistics for one resource
    pub async fn stats(&self, key: &ResourceKey) -> Option<MultiplexerStats> {
        self.entries.read().await.get(key).map(|mux| mux.stats())
    }

    /// Get total number of registered resources
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no resource has been registered
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove multiplexers idle for longer than the configured timeout
    ///
    /// Returns the number of entries removed. Does nothing when no idle
    /// timeout is configured. Entries still referenced outside the registry
    /// (a handle from `get_or_create`, a producer winding down) are kept.
    pub async fn reclaim_idle(&self) -> usize {
        let Some(timeout) = self.config.idle_timeout else {
            return 0;
        };

        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|key, mux| {
            let idle = Arc::strong_count(mux) == 1 && mux.idle_longer_than(timeout);
            if idle {
                tracing::info!(key = %key, "Idle multiplexer reclaimed");
            }
            !idle
        });

        before - entries.len()
    }

    /// Spawn background reclaim task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_reclaim_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.reclaim_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.reclaim_idle().await;
            }
        })
    }

    /// Cancel every upstream connection and close every subscriber
    ///
    /// Entries stay registered; a later subscribe reconnects.
    pub async fn shutdown(&self) {
        let entries = self.entries.read().await;
        for mux in entries.values() {
            mux.shutdown();
        }
        tracing::info!(resources = entries.len(), "Registry shut down");
    }
}

impl<T: Send + Sync + 'static> Default for ResourceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
