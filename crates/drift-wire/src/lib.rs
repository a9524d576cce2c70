//! DRIFT Wire Protocol - one JSON message per TCP connection
//!
//! The sender writes a UTF-8 JSON object and half-closes its write side;
//! the receiver reads to end of stream and decodes the whole buffer:
//!
//! ```text
//! {"sender": <integer>, "clock": <integer>}
//! ```
//!
//! There is no length prefix. Connection boundaries are the framing, so a
//! connection carries exactly one message.

pub mod message;

pub use message::*;
