//! Event type and block parsing
//!
//! A block is everything between two event boundaries. Its lines follow the
//! event-stream field syntax:
//!
//! ```text
//! event: update        <- sets the kind
//! id: 42               <- last event id
//! data: {"t":1}        <- payload, repeated lines are joined with '\n'
//! : keep-alive         <- comment, ignored
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// A single framed event from an upstream byte stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Event kind from the `event` field (None when the field was absent)
    pub kind: Option<String>,
    /// Last event id from the `id` field
    pub id: Option<String>,
    /// Reconnection hint from the `retry` field, in milliseconds
    pub retry: Option<u64>,
    /// Payload assembled from `data` lines
    pub data: Bytes,
}

impl Event {
    /// Create an event carrying only a payload
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Set the event kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Payload as UTF-8 text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Serialize the event in event-stream form, terminated by a blank line
    ///
    /// Multi-line payloads are split into one `data:` line per line, so
    /// [`parse_block`] reproduces the same payload.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 32);

        if let Some(ref kind) = self.kind {
            buf.put_slice(b"event: ");
            buf.put_slice(kind.as_bytes());
            buf.put_u8(b'\n');
        }
        if let Some(ref id) = self.id {
            buf.put_slice(b"id: ");
            buf.put_slice(id.as_bytes());
            buf.put_u8(b'\n');
        }
        if let Some(retry) = self.retry {
            buf.put_slice(format!("retry: {}\n", retry).as_bytes());
        }
        for line in self.data.split(|&b| b == b'\n') {
            buf.put_slice(b"data: ");
            buf.put_slice(line);
            buf.put_u8(b'\n');
        }
        buf.put_u8(b'\n');

        buf.freeze()
    }
}

/// Decode one framed block into zero or more events
///
/// An event is emitted at each blank line (and at the end of the block) if
/// it collected a payload or a kind. Lines may end in `\n` or `\r\n`.
pub fn parse_block(block: &[u8]) -> Vec<Event> {
    let mut events = Vec::new();
    let mut pending = PendingEvent::default();

    for raw in block.split(|&b| b == b'\n') {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);

        if line.is_empty() {
            pending.dispatch(&mut events);
            continue;
        }

        // Comment
        if line[0] == b':' {
            continue;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };

        match field {
            b"data" => {
                if pending.has_data {
                    pending.data.put_u8(b'\n');
                }
                pending.data.put_slice(value);
                pending.has_data = true;
            }
            b"event" => pending.kind = Some(String::from_utf8_lossy(value).into_owned()),
            b"id" => pending.id = Some(String::from_utf8_lossy(value).into_owned()),
            b"retry" => {
                if let Some(ms) = std::str::from_utf8(value)
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                {
                    pending.retry = Some(ms);
                }
            }
            _ => {
                tracing::trace!(
                    field = %String::from_utf8_lossy(field),
                    "Ignoring unknown event field"
                );
            }
        }
    }

    pending.dispatch(&mut events);
    events
}

#[derive(Default)]
struct PendingEvent {
    kind: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
    data: BytesMut,
    has_data: bool,
}

impl PendingEvent {
    fn dispatch(&mut self, out: &mut Vec<Event>) {
        let pending = std::mem::take(self);
        if !pending.has_data && pending.kind.is_none() {
            return;
        }

        out.push(Event {
            kind: pending.kind,
            id: pending.id,
            retry: pending.retry,
            data: pending.data.freeze(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_data_line() {
        let events = parse_block(b"data: {\"t\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, Bytes::from_static(b"{\"t\":1}"));
        assert_eq!(events[0].kind, None);
    }

    #[test]
    fn test_parse_all_fields() {
        let events = parse_block(b"event: update\nid: 7\nretry: 3000\ndata: hello\n\n");

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind.as_deref(), Some("update"));
        assert_eq!(event.id.as_deref(), Some("7"));
        assert_eq!(event.retry, Some(3000));
        assert_eq!(event.text(), Some("hello"));
    }

    #[test]
    fn test_parse_multiline_data() {
        let events = parse_block(b"data: first\ndata: second\ndata:third\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), Some("first\nsecond\nthird"));
    }

    #[test]
    fn test_parse_crlf_lines() {
        let events = parse_block(b"event: ping\r\ndata: x\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.as_deref(), Some("ping"));
        assert_eq!(events[0].text(), Some("x"));
    }

    #[test]
    fn test_parse_comment_only_block_yields_nothing() {
        assert!(parse_block(b": keep-alive\n\n").is_empty());
        assert!(parse_block(b"\n\n").is_empty());
        assert!(parse_block(b"").is_empty());
    }

    #[test]
    fn test_parse_only_first_space_stripped() {
        let events = parse_block(b"data:  indented\n\n");

        assert_eq!(events[0].text(), Some(" indented"));
    }

    #[test]
    fn test_parse_field_without_colon() {
        // A bare "data" line contributes an empty payload line
        let events = parse_block(b"data\ndata: x\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), Some("\nx"));
    }

    #[test]
    fn test_parse_kind_without_data() {
        let events = parse_block(b"event: heartbeat\n\n");

        assert_eq!(events.len(), 1);
        assert!(events[0].data.is_empty());
    }

    #[test]
    fn test_parse_unknown_field_and_bad_retry_ignored() {
        let events = parse_block(b"foo: bar\nretry: soon\ndata: x\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].retry, None);
        assert_eq!(events[0].text(), Some("x"));
    }

    #[test]
    fn test_encode_parses_back() {
        let event = Event::data("line one\nline two").with_kind("update");
        let encoded = event.encode();

        assert_eq!(
            &encoded[..],
            b"event: update\ndata: line one\ndata: line two\n\n"
        );
        assert_eq!(parse_block(&encoded), vec![event]);
    }
}
