//! Wire protocol support: reply frames, the command encoder and the
//! streaming reply decoder.
//!
//! Disque reuses the Redis serialization protocol. Requests are arrays of
//! bulk strings (`*<argc>\r\n` then `$<len>\r\n<bytes>\r\n` per argument);
//! replies are the usual `+`/`-`/`:`/`$`/`*` frame grammar.

/// Command encoding and reply decoding.
pub mod codec;
/// Error taxonomy shared across the crate.
pub mod error;
/// Reply frame type.
pub mod frame;

pub use error::{Error, Result};
pub use frame::Frame;
