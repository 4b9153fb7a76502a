//! Event-stream framing
//!
//! Reconstructs discrete events from a raw byte stream that may arrive in
//! chunks of any size. The transport provides no framing; a blank line
//! (two consecutive line terminators) separates events.
//!
//! ```text
//!   chunks:  [data: {"t"] [:1}\n] [\ndata: {"t":2}\n\n]
//!                  │          │            │
//!                  └──────────┴─► EventFramer ──► Event { data: {"t":1} }
//!                                              └─► Event { data: {"t":2} }
//! ```

pub mod decoder;
pub mod event;
pub mod stream;

pub use decoder::{EventFramer, DEFAULT_MAX_EVENT_SIZE};
pub use event::{parse_block, Event};
pub use stream::EventStream;
