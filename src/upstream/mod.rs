//! Upstream transport
//!
//! Opens the raw byte streams that feed resource connections, and performs
//! the one-shot JSON fetches used for initial page data.

pub mod config;
pub mod http;
pub mod source;

pub use config::UpstreamConfig;
pub use http::UpstreamClient;
pub use source::{ByteStream, Source};
