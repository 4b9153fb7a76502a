//! # sse-fanout
//!
//! Live-update fan-out for event-stream resources. Many local subscribers of
//! the same upstream URL share one upstream connection: the first subscriber
//! opens it, every decoded value is broadcast to all subscribers, and the
//! connection is cancelled once the last subscriber leaves.
//!
//! ## Features
//!
//! - **Event framing**: incremental `text/event-stream` parsing over arbitrary
//!   chunk boundaries
//! - **Shared upstream**: one connection per normalized resource key
//! - **Backpressure**: bounded per-subscriber queues with a configurable
//!   overflow policy
//! - **Weather API**: typed one-shot fetches and live feeds for stations,
//!   regions and locations
//!
//! ## Quick start
//!
//! ```no_run
//! use sse_fanout::registry::{Delivery, RegistryConfig};
//! use sse_fanout::weather::WeatherApi;
//!
//! # async fn run() -> sse_fanout::Result<()> {
//! let api = WeatherApi::connect("https://weather.example/api/", RegistryConfig::default())?;
//! let mut updates = api.station_condition_updates("wu", "KUTPROVO12").await?;
//!
//! let ctrl_c = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! tokio::pin!(ctrl_c);
//!
//! while let Delivery::Value(conditions) = updates.recv_or_cancel(&mut ctrl_c).await {
//!     println!("{} at {}", conditions.station, conditions.time);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod framer;
pub mod registry;
pub mod upstream;
pub mod weather;

pub use error::{Error, Result};
pub use framer::{Event, EventFramer, EventStream};
pub use registry::{
    CloseReason, Delivery, OverflowPolicy, RegistryConfig, ResourceConnection, ResourceKey,
    ResourceRegistry, Subscription,
};
pub use upstream::{Source, UpstreamClient, UpstreamConfig};
