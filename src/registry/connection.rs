//! Resource connection
//!
//! Owns one upstream streaming read for one resource key. Bytes flow through
//! the event framer, each event payload goes through the caller's decode
//! function, and decoded values are handed to the owner one at a time.
//!
//! A single bad payload is logged and skipped. Transport failure, end of
//! stream and cancellation all end the run; the caller gets exactly one
//! [`Termination`] per run.

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::framer::{EventStream, DEFAULT_MAX_EVENT_SIZE};
use crate::upstream::Source;

use super::key::ResourceKey;

/// Caller-supplied payload decoder
pub type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Why a connection run ended
#[derive(Debug)]
pub enum Termination {
    /// Upstream closed the stream
    EndOfStream,
    /// The owner cancelled the run (not a failure)
    Cancelled,
    /// Opening or reading the upstream failed
    Failed(Error),
}

impl Termination {
    /// Whether the run ended because of an error
    pub fn is_failure(&self) -> bool {
        matches!(self, Termination::Failed(_))
    }
}

/// Recipe for opening and decoding one upstream resource
///
/// Each call to [`run`](Self::run) opens a fresh upstream stream; the
/// recipe itself is reusable across connection lifetimes.
pub struct ResourceConnection<T> {
    key: ResourceKey,
    source: Arc<dyn Source>,
    decode: DecodeFn<T>,
    max_event_size: usize,
}

impl<T> Clone for ResourceConnection<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            source: Arc::clone(&self.source),
            decode: Arc::clone(&self.decode),
            max_event_size: self.max_event_size,
        }
    }
}

impl<T: DeserializeOwned> ResourceConnection<T> {
    /// Connection whose event payloads are JSON documents of type `T`
    pub fn json(key: ResourceKey, source: Arc<dyn Source>) -> Self {
        Self::new(key, source, |payload| Ok(serde_json::from_slice(payload)?))
    }
}

impl<T> ResourceConnection<T> {
    /// Create a connection with a custom decoder
    pub fn new<F>(key: ResourceKey, source: Arc<dyn Source>, decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            key,
            source,
            decode: Arc::new(decode),
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }

    /// Set the maximum size of a single framed event
    pub fn with_max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    /// Resource key this connection reads
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Open the upstream and deliver decoded values until the run ends
    ///
    /// When `cancel` fires the upstream stream is dropped, which closes the
    /// transport and unblocks any pending read. A delivery that is still
    /// waiting is abandoned as well.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut deliver: F) -> Termination
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Termination::Cancelled,
            opened = self.source.open(&self.key) => opened,
        };

        let body = match opened {
            Ok(body) => body,
            Err(e) => return Termination::Failed(e),
        };

        tracing::info!(key = %self.key, "Upstream connection opened");

        let mut events = EventStream::with_max_size(body, self.max_event_size);
        let mut delivered: u64 = 0;
        let mut rejected: u64 = 0;

        let termination = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Termination::Cancelled,
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => break Termination::Failed(e),
                None => break Termination::EndOfStream,
            };

            let value = match (self.decode)(&event.data) {
                Ok(value) => value,
                Err(e) => {
                    rejected += 1;
                    tracing::warn!(
                        key = %self.key,
                        kind = ?event.kind,
                        error = %e,
                        "Dropping event that failed to decode"
                    );
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Termination::Cancelled,
                _ = deliver(value) => delivered += 1,
            }
        };

        events.close();

        tracing::debug!(
            key = %self.key,
            delivered = delivered,
            rejected = rejected,
            termination = ?termination,
            "Upstream connection finished"
        );

        termination
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;

    use super::*;
    use crate::registry::testing::ChannelSource;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reading {
        t: u32,
    }

    fn connection(source: &Arc<ChannelSource>) -> ResourceConnection<Reading> {
        let key = ResourceKey::parse("http://upstream.test/updates/").unwrap();
        ResourceConnection::json(key, source.clone())
    }

    #[tokio::test]
    async fn test_decodes_events_in_order_until_end_of_stream() {
        let source = Arc::new(ChannelSource::new());
        let conn = connection(&source);
        let received = Mutex::new(Vec::new());

        source.queue(0, "data: {\"t\":1}\n\nda");
        source.queue(0, "ta: {\"t\":2}\n\n");
        source.finish(0);

        let termination = conn
            .run(CancellationToken::new(), |v| {
                received.lock().unwrap().push(v);
                async {}
            })
            .await;

        assert!(matches!(termination, Termination::EndOfStream));
        assert_eq!(
            *received.lock().unwrap(),
            vec![Reading { t: 1 }, Reading { t: 2 }]
        );
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let source = Arc::new(ChannelSource::new());
        let conn = connection(&source);
        let received = Mutex::new(Vec::new());

        source.queue(0, "data: {\"t\":1}\n\ndata: not-json\n\ndata: {\"t\":3}\n\n");
        source.finish(0);

        conn.run(CancellationToken::new(), |v| {
            received.lock().unwrap().push(v);
            async {}
        })
        .await;

        assert_eq!(
            *received.lock().unwrap(),
            vec![Reading { t: 1 }, Reading { t: 3 }]
        );
    }

    #[tokio::test]
    async fn test_transport_error_fails_run() {
        let source = Arc::new(ChannelSource::new());
        let conn = connection(&source);

        source.queue(0, "data: {\"t\":1}\n\n");
        source.fail(0);

        let termination = conn.run(CancellationToken::new(), |_| async {}).await;

        assert!(termination.is_failure());
    }

    #[tokio::test]
    async fn test_not_found_on_open() {
        let source = Arc::new(ChannelSource::not_found());
        let conn = connection(&source);

        let termination = conn.run(CancellationToken::new(), |_| async {}).await;

        match termination {
            Termination::Failed(e) => assert!(e.is_not_found()),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_closes_transport() {
        let source = Arc::new(ChannelSource::new());
        let conn = connection(&source);
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { conn.run(cancel, |_| async {}).await })
        };

        source.wait_for_opens(1).await;
        assert!(!source.is_closed(0));

        cancel.cancel();
        let termination = task.await.unwrap();

        assert!(matches!(termination, Termination::Cancelled));
        assert!(source.is_closed(0));
    }

    #[tokio::test]
    async fn test_cancel_before_open() {
        let source = Arc::new(ChannelSource::new());
        let conn = connection(&source);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let termination = conn.run(cancel, |_| async {}).await;

        assert!(matches!(termination, Termination::Cancelled));
        assert_eq!(source.opens(), 0);
    }

    #[tokio::test]
    async fn test_custom_decoder() {
        let source = Arc::new(ChannelSource::new());
        let key = ResourceKey::parse("http://upstream.test/text/").unwrap();
        let conn = ResourceConnection::new(key, source.clone(), |payload: &[u8]| {
            std::str::from_utf8(payload)
                .map(str::to_uppercase)
                .map_err(|e| Error::Malformed(e.to_string()))
        });
        let received = Mutex::new(Vec::new());

        source.queue(0, "data: hello\n\n");
        source.finish(0);

        conn.run(CancellationToken::new(), |v| {
            received.lock().unwrap().push(v);
            async {}
        })
        .await;

        assert_eq!(*received.lock().unwrap(), vec!["HELLO".to_string()]);
    }
}
