use bytes::{Buf, BytesMut};

use crate::proto::error::Error;
use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default

/// A streaming reply decoder.
///
/// Call [`append`](Decoder::append) as bytes arrive from the network, then
/// [`decode`](Decoder::decode) to parse frames. `Ok(None)` means the buffer
/// does not yet hold a complete frame; buffered bytes are only consumed once
/// an entire frame (including every element of a nested array) has parsed,
/// so a partial feed never corrupts decoder state.
///
/// A returned [`Error::Protocol`] invalidates the decoder: the owning
/// connection must discard it and treat the transport as dead.
///
/// # Example
///
/// ```
/// use disquer::proto::codec::Decoder;
/// use disquer::proto::frame::Frame;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"+OK\r\n");
/// let frame = decoder.decode().unwrap().unwrap();
/// assert_eq!(frame, Frame::SimpleString(b"OK".to_vec()));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends raw bytes to the internal buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode one frame from the buffer.
    ///
    /// Returns `Ok(Some(Frame))` for a complete frame, `Ok(None)` when more
    /// data is needed, and `Err(Error::Protocol)` for a malformed frame.
    pub fn decode(&mut self) -> crate::Result<Option<Frame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut pos = 0;
        match self.parse(&mut pos)? {
            Some(frame) => {
                self.buf.advance(pos);
                Ok(Some(frame))
            }
            None => {
                if self.buf.len() > self.max_frame_size {
                    return Err(Error::protocol("frame exceeds maximum size"));
                }
                Ok(None)
            }
        }
    }

    fn parse(&self, pos: &mut usize) -> crate::Result<Option<Frame>> {
        let Some(&type_byte) = self.buf.get(*pos) else {
            return Ok(None);
        };
        *pos += 1;
        match type_byte {
            b'+' => Ok(self.line(pos)?.map(|s| Frame::SimpleString(s.to_vec()))),
            b'-' => Ok(self.line(pos)?.map(|s| Frame::Error(s.to_vec()))),
            b':' => match self.line(pos)? {
                Some(line) => Ok(Some(Frame::Integer(parse_int(line)?))),
                None => Ok(None),
            },
            b'$' => self.parse_bulk(pos),
            b'*' => self.parse_array(pos),
            other => Err(Error::protocol(format!(
                "unknown frame type: {:?}",
                other as char
            ))),
        }
    }

    fn parse_bulk(&self, pos: &mut usize) -> crate::Result<Option<Frame>> {
        let len = match self.line(pos)? {
            Some(line) => parse_int(line)?,
            None => return Ok(None),
        };
        if len == -1 {
            return Ok(Some(Frame::BulkString(None)));
        }
        if len < 0 {
            return Err(Error::protocol(format!("invalid bulk length {len}")));
        }
        let len = len as usize;
        if len > self.max_frame_size {
            return Err(Error::protocol("bulk string exceeds maximum frame size"));
        }
        if self.buf.len() < *pos + len + 2 {
            return Ok(None);
        }
        let data = self.buf[*pos..*pos + len].to_vec();
        if &self.buf[*pos + len..*pos + len + 2] != b"\r\n" {
            return Err(Error::protocol("bulk string missing CRLF terminator"));
        }
        *pos += len + 2;
        Ok(Some(Frame::BulkString(Some(data.into()))))
    }

    fn parse_array(&self, pos: &mut usize) -> crate::Result<Option<Frame>> {
        let len = match self.line(pos)? {
            Some(line) => parse_int(line)?,
            None => return Ok(None),
        };
        if len == -1 {
            return Ok(Some(Frame::Null));
        }
        if len < 0 {
            return Err(Error::protocol(format!("invalid array length {len}")));
        }
        let len = len as usize;
        // Assume a minimum of 16 bytes per element.
        if len > self.max_frame_size / 16 {
            return Err(Error::protocol("array length exceeds reasonable maximum"));
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            match self.parse(pos)? {
                Some(frame) => items.push(frame),
                None => return Ok(None),
            }
        }
        Ok(Some(Frame::Array(items)))
    }

    /// Returns the line starting at `pos` up to the next CRLF, advancing
    /// `pos` past the terminator, or `None` if the line is incomplete.
    fn line(&self, pos: &mut usize) -> crate::Result<Option<&[u8]>> {
        let start = *pos;
        let mut i = start;
        while i + 1 < self.buf.len() {
            match (self.buf[i], self.buf[i + 1]) {
                (b'\r', b'\n') => {
                    *pos = i + 2;
                    return Ok(Some(&self.buf[start..i]));
                }
                (b'\r', _) | (b'\n', _) => {
                    return Err(Error::protocol("bare CR or LF inside line"));
                }
                _ => i += 1,
            }
        }
        Ok(None)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_int(line: &[u8]) -> crate::Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::protocol(format!(
                "invalid integer: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_decode_simple_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::SimpleString(b"OK".to_vec()));
    }

    #[test]
    fn test_decode_error() {
        let mut decoder = Decoder::new();
        decoder.append(b"-ERR some error\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::Error(b"ERR some error".to_vec()));
    }

    #[test]
    fn test_decode_integer() {
        let mut decoder = Decoder::new();
        decoder.append(b":42\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::Integer(42));
    }

    #[test]
    fn test_decode_bulk_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"$5\r\nhello\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::BulkString(Some(Bytes::from("hello"))));
    }

    #[test]
    fn test_decode_bulk_string_null() {
        let mut decoder = Decoder::new();
        decoder.append(b"$-1\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::BulkString(None));
    }

    #[test]
    fn test_decode_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("foo"))),
                Frame::BulkString(Some(Bytes::from("bar"))),
            ])
        );
    }

    #[test]
    fn test_decode_nested_array() {
        // a one-job GETJOB reply: [[queue, id, body]]
        let mut decoder = Decoder::new();
        decoder.append(b"*1\r\n*3\r\n$1\r\nq\r\n$2\r\nid\r\n$4\r\nbody\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("q"))),
                Frame::BulkString(Some(Bytes::from("id"))),
                Frame::BulkString(Some(Bytes::from("body"))),
            ])])
        );
    }

    #[test]
    fn test_decode_null_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"*-1\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::Null);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, Frame::SimpleString(b"OK".to_vec()));
    }

    #[test]
    fn test_decode_partial_array_keeps_state() {
        // The array header and first element arrive before the rest; the
        // decoder must not consume anything until the whole frame is in.
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n$3\r\nfoo\r\n");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"$3\r\nbar\r\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("foo"))),
                Frame::BulkString(Some(Bytes::from("bar"))),
            ])
        );
    }

    #[test]
    fn test_decode_consecutive_frames() {
        let mut decoder = Decoder::new();
        decoder.append(b":1\r\n:2\r\n");
        assert_eq!(decoder.decode().unwrap().unwrap(), Frame::Integer(1));
        assert_eq!(decoder.decode().unwrap().unwrap(), Frame::Integer(2));
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_decode_unknown_type_byte() {
        let mut decoder = Decoder::new();
        decoder.append(b"!bogus\r\n");
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_bad_integer() {
        let mut decoder = Decoder::new();
        decoder.append(b":notanumber\r\n");
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_bulk_missing_terminator() {
        let mut decoder = Decoder::new();
        decoder.append(b"$3\r\nfooXX");
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_bulk_exceeds_max_size() {
        let mut decoder = Decoder::with_max_frame_size(10);
        decoder.append(b"$100\r\n");
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_decode_array_exceeds_reasonable_max() {
        let mut decoder = Decoder::with_max_frame_size(1024);
        let huge_count = (1024 / 16) + 100;
        decoder.append(format!("*{huge_count}\r\n").as_bytes());
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
