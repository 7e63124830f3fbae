use bytes::{BufMut, Bytes, BytesMut};

/// A scalar command argument.
///
/// Disque commands are flat argument lists; every argument is sent as a
/// bulk string. Integers and floats are rendered as decimal text before
/// length-prefixing.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// UTF-8 text.
    Str(String),
    /// Signed integer, sent as decimal text.
    Int(i64),
    /// Float, sent as decimal text. Must be finite.
    Float(f64),
    /// Raw bytes (job bodies may be binary).
    Bytes(Bytes),
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(value.into())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

/// Encodes command argument lists into the length-prefixed multibulk
/// request framing.
///
/// The encoder accumulates data in an internal buffer; [`take`](Encoder::take)
/// drains it for writing. A rejected argument leaves the buffer untouched,
/// so a failed encode never produces a partial request.
///
/// # Example
///
/// ```
/// use disquer::proto::codec::{Arg, Encoder};
///
/// let mut encoder = Encoder::new();
/// encoder.encode_command(&[Arg::from("PING")]).unwrap();
/// assert_eq!(encoder.take().as_ref(), b"*1\r\n$4\r\nPING\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Encodes one command as `*<argc>\r\n` followed by a length-prefixed
    /// bulk string per argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for
    /// an empty argument list or a non-finite float. Nothing is buffered on
    /// failure.
    pub fn encode_command(&mut self, args: &[Arg]) -> crate::Result<()> {
        if args.is_empty() {
            return Err(crate::Error::invalid_argument("empty command"));
        }
        for arg in args {
            if let Arg::Float(f) = arg {
                if !f.is_finite() {
                    return Err(crate::Error::invalid_argument(format!(
                        "cannot encode non-finite float {f:?}"
                    )));
                }
            }
        }

        self.buf.put_u8(b'*');
        self.buf.extend_from_slice(args.len().to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for arg in args {
            match arg {
                Arg::Str(s) => self.put_bulk(s.as_bytes()),
                Arg::Int(i) => self.put_bulk(i.to_string().as_bytes()),
                Arg::Float(f) => self.put_bulk(f.to_string().as_bytes()),
                Arg::Bytes(b) => self.put_bulk(b),
            }
        }
        Ok(())
    }

    fn put_bulk(&mut self, data: &[u8]) {
        self.buf.put_u8(b'$');
        self.buf.extend_from_slice(data.len().to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Takes the encoded data from the buffer, leaving the encoder reusable.
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }
}
