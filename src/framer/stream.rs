//! Lazy event stream over a byte-chunk stream

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use crate::error::{Error, Result};

use super::decoder::EventFramer;
use super::event::Event;

/// Adapts a stream of byte chunks into a stream of events
///
/// Events are yielded in arrival order, each only after its boundary has been
/// seen. A chunk error is passed through and ends the stream; so does an
/// oversized event, after the events completed before it. A partial event
/// left when the input ends is dropped.
pub struct EventStream<S> {
    inner: Option<S>,
    framer: EventFramer,
    ready: VecDeque<Event>,
    failed: Option<Error>,
}

impl<S> EventStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    /// Wrap a chunk stream with the default event size limit
    pub fn new(inner: S) -> Self {
        Self::with_framer(inner, EventFramer::new())
    }

    /// Wrap a chunk stream with a custom event size limit
    pub fn with_max_size(inner: S, max_size: usize) -> Self {
        Self::with_framer(inner, EventFramer::with_max_size(max_size))
    }

    fn with_framer(inner: S, framer: EventFramer) -> Self {
        Self {
            inner: Some(inner),
            framer,
            ready: VecDeque::new(),
            failed: None,
        }
    }

    /// Stop reading and drop the underlying chunk stream
    ///
    /// For an HTTP body this closes the connection, so nothing more is read.
    pub fn close(&mut self) {
        self.inner = None;
        self.ready.clear();
        self.failed = None;
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if let Some(e) = this.failed.take() {
                return Poll::Ready(Some(Err(e)));
            }

            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(inner).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => match this.framer.push(&chunk) {
                    Ok(events) => {
                        this.ready.extend(events);
                        if let Some(e) = this.framer.take_overflow() {
                            this.inner = None;
                            this.failed = Some(e);
                        }
                    }
                    Err(e) => {
                        this.inner = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.inner = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    let framer = std::mem::take(&mut this.framer);
                    framer.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{stream, StreamExt};

    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_two_reads_two_events_in_order() {
        let mut events = EventStream::new(chunks(&["data: {\"t\":1}\n\nda", "ta: {\"t\":2}\n\n"]));

        let first = events.next().await.unwrap().unwrap();
        let second = events.next().await.unwrap().unwrap();

        assert_eq!(first.text(), Some("{\"t\":1}"));
        assert_eq!(second.text(), Some("{\"t\":2}"));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_trailing_partial_event_not_synthesized() {
        let events: Vec<_> = EventStream::new(chunks(&["data: 1\n\n", "data: 2\n"]))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_chunk_error_passes_through_and_ends() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ]);
        let mut events = EventStream::new(source);

        assert!(events.next().await.unwrap().is_ok());
        assert!(matches!(events.next().await, Some(Err(Error::Io(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_event_ends_stream() {
        let mut events = EventStream::with_max_size(chunks(&["data: 0123456789abcdef"]), 8);

        assert!(matches!(
            events.next().await,
            Some(Err(Error::EventTooLarge { limit: 8 }))
        ));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_tail_after_complete_event() {
        let mut events = EventStream::with_max_size(
            chunks(&["data: 1\n\ndata: this tail never ends at all", "data: 2\n\n"]),
            16,
        );

        assert_eq!(events.next().await.unwrap().unwrap().text(), Some("1"));
        assert!(matches!(
            events.next().await,
            Some(Err(Error::EventTooLarge { limit: 16 }))
        ));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_stops_reading() {
        let mut events = EventStream::new(chunks(&["data: 1\n\ndata: 2\n\n"]));

        assert!(events.next().await.is_some());
        events.close();
        assert!(events.next().await.is_none());
    }
}
