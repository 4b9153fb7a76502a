//! Byte source abstraction
//!
//! A [`Source`] opens the raw upstream stream for a resource key. The HTTP
//! implementation is [`UpstreamClient`](super::UpstreamClient); tests and
//! embedders can plug in anything that yields byte chunks.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::error::Result;
use crate::registry::ResourceKey;

/// Raw upstream body as a stream of chunks
///
/// Dropping the stream closes the underlying transport.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opens streaming reads for resource keys
pub trait Source: Send + Sync + 'static {
    /// Open the streaming body for `key`
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when the
    /// upstream has no such resource.
    fn open<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, Result<ByteStream>>;
}
