//! Protocol modules (frame codec + JSON envelopes).
//!
//! - Frame: the length header that delimits one JSON body on a byte stream,
//!   in one of three wire variants.
//! - Envelope: typed JSON documents carried inside a frame.
//!
//! All parsers are panic-free: malformed input is reported as `HarnessError`
//! instead of panicking or indexing raw buffers, keeping the harness alive
//! against a misbehaving server.

pub mod envelope;
pub mod frame;
