//! In-memory byte source for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::upstream::{ByteStream, Source};

use super::key::ResourceKey;

type Feed = mpsc::UnboundedSender<Result<Bytes>>;

/// Source whose streams are fed by the test, one feed per `open` call
///
/// Chunks queued for a connection index before it is opened are buffered and
/// handed over when it opens.
pub(crate) struct ChannelSource {
    not_found: bool,
    opens: AtomicUsize,
    feeds: Mutex<Vec<Feed>>,
    pending: Mutex<Vec<Option<mpsc::UnboundedReceiver<Result<Bytes>>>>>,
}

impl ChannelSource {
    pub(crate) fn new() -> Self {
        Self {
            not_found: false,
            opens: AtomicUsize::new(0),
            feeds: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::new()
        }
    }

    /// Number of upstream streams opened so far
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn ensure(&self, index: usize) {
        let mut feeds = self.feeds.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        while feeds.len() <= index {
            let (tx, rx) = mpsc::unbounded_channel();
            feeds.push(tx);
            pending.push(Some(rx));
        }
    }

    /// Queue a chunk for connection `index`
    pub(crate) fn queue(&self, index: usize, chunk: &'static str) {
        self.ensure(index);
        let _ = self.feeds.lock().unwrap()[index].send(Ok(Bytes::from_static(chunk.as_bytes())));
    }

    /// Inject a transport error into connection `index`
    pub(crate) fn fail(&self, index: usize) {
        self.ensure(index);
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let _ = self.feeds.lock().unwrap()[index].send(Err(Error::Io(err)));
    }

    /// End connection `index` with a clean end of stream
    pub(crate) fn finish(&self, index: usize) {
        self.ensure(index);
        let (tx, _) = mpsc::unbounded_channel();
        let _ = std::mem::replace(&mut self.feeds.lock().unwrap()[index], tx);
    }

    /// Whether the reader of connection `index` has gone away
    pub(crate) fn is_closed(&self, index: usize) -> bool {
        self.ensure(index);
        let opened = self.opens() > index;
        opened && self.feeds.lock().unwrap()[index].is_closed()
    }

    /// Wait until at least `count` streams have been opened
    pub(crate) async fn wait_for_opens(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.opens() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("upstream was never opened");
    }

    /// Wait until the reader of connection `index` has gone away
    pub(crate) async fn wait_for_close(&self, index: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_closed(index) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("upstream was never closed");
    }
}

impl Source for ChannelSource {
    fn open<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, Result<ByteStream>> {
        Box::pin(async move {
            if self.not_found {
                return Err(Error::NotFound {
                    url: key.url().to_string(),
                });
            }

            let index = self.opens.load(Ordering::SeqCst);
            self.ensure(index);
            let rx = self.pending.lock().unwrap()[index]
                .take()
                .expect("connection opened twice");
            self.opens.fetch_add(1, Ordering::SeqCst);

            let body = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(body.boxed())
        })
    }
}
