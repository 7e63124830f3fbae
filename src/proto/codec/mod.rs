//! Command encoding and streaming reply decoding.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::{Arg, Encoder};
