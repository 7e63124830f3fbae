use bytes::Bytes;

/// A reply frame in the Disque wire protocol.
///
/// Disque replies use the Redis serialization grammar:
/// - SimpleString: status replies like "OK"
/// - Error: error replies from the server
/// - Integer: numeric replies (e.g. acknowledged job counts)
/// - BulkString: binary-safe string data (job bodies, job IDs)
/// - Array: nested replies (job records, scan pages, HELLO)
/// - Null: NULL reply (`$-1` or `*-1`)
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null ($-1 or *-1).
    Null,
}

impl Frame {
    /// Returns the textual content of a string-like frame.
    ///
    /// Integers are rendered in decimal; `Null` and nil bulk strings yield
    /// `None`, as do arrays.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Frame::SimpleString(s) | Frame::Error(s) => {
                Some(String::from_utf8_lossy(s).into_owned())
            }
            Frame::BulkString(Some(b)) => Some(String::from_utf8_lossy(b).into_owned()),
            Frame::Integer(i) => Some(i.to_string()),
            Frame::BulkString(None) | Frame::Null | Frame::Array(_) => None,
        }
    }

    /// Attempts to extract the bulk string payload from this frame.
    pub fn to_bulk(&self) -> Option<Bytes> {
        match self {
            Frame::BulkString(b) => b.clone(),
            _ => None,
        }
    }

    /// Consumes the frame, returning the nested replies if it is an array.
    pub fn into_array(self) -> Option<Vec<Frame>> {
        match self {
            Frame::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Attempts to extract an integer from this frame.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true if this frame is a nil reply.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }
}
