//! Resource registry for live-update fan-out
//!
//! The registry maps resource keys to multiplexers. Each multiplexer owns the
//! subscriber queues for one key and runs at most one upstream connection,
//! started by the first subscriber and cancelled when the last one leaves.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ResourceRegistry<T>>
//!                   ┌────────────────────────────┐
//!                   │ entries: HashMap<Key,      │
//!                   │   Arc<Multiplexer<T>> {    │
//!                   │     subscribers: [tx..],   │
//!                   │     producer: Idle|Active, │
//!                   │   }                        │
//!                   │ >                          │
//!                   └─────────────┬──────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//!  [ResourceConnection]     [Subscription]           [Subscription]
//!  source.open(key)         recv_or_cancel()         recv_or_cancel()
//!        │                        ▲                        ▲
//!        └─► framer ─► decode ─► notify() ─────────────────┘
//! ```
//!
//! # Shared values
//!
//! Each value is wrapped in an `Arc` once and every subscriber queue gets a
//! clone of that pointer, so the decoded value itself is never copied.

pub mod config;
pub mod connection;
pub mod key;
pub mod multiplexer;
pub mod store;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{OverflowPolicy, RegistryConfig};
pub use connection::{DecodeFn, ResourceConnection, Termination};
pub use key::ResourceKey;
pub use multiplexer::{Multiplexer, MultiplexerState, MultiplexerStats, SubscriberId};
pub use store::ResourceRegistry;
pub use subscription::{CloseReason, Delivery, Subscription};
