use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::core::address::Address;
use crate::core::command::Cmd;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::Error;
use crate::proto::frame::Frame;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::path::Path;
        use tokio::net::UnixStream;
    }
}

type CloseListener = Box<dyn FnOnce() + Send>;

const READ_CHUNK: usize = 16 * 1024;

/// The transport kind is fixed once at connect time.
enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Transport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.read(buf).await,
            #[cfg(unix)]
            Transport::Unix(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Transport::Tcp(s) => s.write_all(buf).await,
            #[cfg(unix)]
            Transport::Unix(s) => s.write_all(buf).await,
        }
    }

    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.try_read(buf),
            #[cfg(unix)]
            Transport::Unix(s) => s.try_read(buf),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        async fn connect_unix(path: &Path) -> crate::Result<Transport> {
            let stream = UnixStream::connect(path).await.map_err(connect_error)?;
            Ok(Transport::Unix(stream))
        }
    } else {
        async fn connect_unix(_path: &std::path::Path) -> crate::Result<Transport> {
            Err(Error::Address {
                message: "unix domain sockets are not supported on this platform".to_string(),
            })
        }
    }
}

fn connect_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::ConnectionRefused {
        Error::ConnectionRefused
    } else {
        Error::Io { source: err }
    }
}

/// A single connection to a Disque server.
///
/// A connection owns its transport and codec state and carries exactly one
/// in-flight command at a time; `&mut self` on [`send`](Connection::send)
/// enforces that at compile time. Liveness is assumed optimistically: the
/// cost of detecting a dead peer is paid at the next use or at an explicit
/// [`is_closed`](Connection::is_closed) query, never by background polling.
///
/// # Example
///
/// ```no_run
/// use disquer::{Address, Connection};
/// use disquer::Cmd;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let address = Address::parse("127.0.0.1:7711")?;
///     let mut conn = Connection::connect(&address).await?;
///     let reply = conn.send(&Cmd::new("PING")).await?;
///     println!("{reply:?}");
///     Ok(())
/// }
/// ```
pub struct Connection {
    stream: Option<Transport>,
    decoder: Decoder,
    encoder: Encoder,
    closed: bool,
    closing: bool,
    close_listeners: Vec<CloseListener>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Connection {
    /// Opens a connection to the given address.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionRefused`] when the remote explicitly refuses;
    /// any other transport failure is wrapped as [`Error::Io`].
    pub async fn connect(address: &Address) -> crate::Result<Self> {
        let stream = match address {
            Address::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(connect_error)?;
                Transport::Tcp(stream)
            }
            Address::Unix { path } => connect_unix(path).await?,
        };
        debug!(%address, "connected");
        Ok(Self {
            stream: Some(stream),
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            closed: false,
            closing: false,
            close_listeners: Vec::new(),
            read_timeout: None,
            write_timeout: None,
        })
    }

    /// Configures read and write deadlines for this connection.
    ///
    /// An elapsed read deadline closes the connection: a partially read
    /// frame cannot be safely abandoned and resumed.
    pub fn with_timeouts(
        mut self,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Registers a listener invoked exactly once when the connection
    /// transitions to closed. If the connection is already closed the
    /// listener fires immediately.
    pub fn on_close(&mut self, listener: impl FnOnce() + Send + 'static) {
        if self.closed {
            listener();
        } else {
            self.close_listeners.push(Box::new(listener));
        }
    }

    /// Sends one command and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the connection is already closed, or if the
    ///   peer half-closed before a reply was decoded;
    /// - [`Error::Protocol`] on a malformed frame (fatal: the connection is
    ///   closed and the decoder replaced);
    /// - [`Error::Server`] for an error reply (the connection stays open);
    /// - [`Error::Timeout`] when a configured deadline elapses (fatal).
    pub async fn send(&mut self, cmd: &Cmd) -> crate::Result<Frame> {
        if self.closed || self.closing {
            return Err(Error::Closed);
        }

        self.encoder.encode_command(cmd.args())?;
        let request = self.encoder.take();
        trace!(len = request.len(), "writing request");
        if let Err(err) = self.write_request(&request).await {
            self.closing = true;
            self.do_close();
            return Err(err);
        }

        loop {
            match self.decoder.decode() {
                Ok(Some(frame)) => {
                    if self.peer_at_eof() {
                        // The peer hung up right after replying; the reply is
                        // still honored, listeners fire before we return.
                        self.closing = true;
                        self.do_close();
                    }
                    return match frame {
                        Frame::Error(message) => Err(Error::Server {
                            message: String::from_utf8_lossy(&message).into_owned(),
                        }),
                        frame => Ok(frame),
                    };
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(%err, "protocol fault, closing connection");
                    self.decoder = Decoder::new();
                    self.closing = true;
                    self.do_close();
                    return Err(err);
                }
            }

            let mut buf = [0u8; READ_CHUNK];
            match self.read_chunk(&mut buf).await {
                Ok(0) => {
                    debug!("peer half-closed the connection");
                    self.closing = true;
                    self.do_close();
                    return Err(Error::Closed);
                }
                Ok(n) => self.decoder.append(&buf[..n]),
                Err(err) => {
                    self.closing = true;
                    self.do_close();
                    return Err(err);
                }
            }
        }
    }

    /// Closes the connection. Idempotent.
    pub fn close(&mut self) {
        self.do_close();
    }

    /// True once the connection is closed.
    ///
    /// Also probes the socket without blocking: a peer that already hung up
    /// is detected here and the close side-effect runs before answering, so
    /// this query never under-reports a dead peer.
    pub fn is_closed(&mut self) -> bool {
        if self.closed || self.closing {
            return true;
        }
        if self.peer_at_eof() {
            self.closing = true;
            self.do_close();
            return true;
        }
        false
    }

    async fn write_request(&mut self, data: &[u8]) -> crate::Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.write_all(data))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(Error::from),
            None => stream.write_all(data).await.map_err(Error::from),
        }
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.read(buf))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(Error::from),
            None => stream.read(buf).await.map_err(Error::from),
        }
    }

    /// Non-blocking check for a peer that already ended its stream. Bytes
    /// that happen to be probed are fed to the decoder, not dropped.
    fn peer_at_eof(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return true;
        };
        let mut probe = [0u8; 64];
        match stream.try_read(&mut probe) {
            Ok(0) => true,
            Ok(n) => {
                self.decoder.append(&probe[..n]);
                false
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        }
    }

    /// The close side-effect. Runs at most once regardless of which path
    /// triggered it: explicit close, half-close detection, a protocol fault
    /// or the opportunistic probe in [`is_closed`](Connection::is_closed).
    fn do_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.closing = false;
        // Dropping the transport releases the socket.
        self.stream = None;
        debug!("connection closed");
        for listener in self.close_listeners.drain(..) {
            listener();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.closed)
            .field("closing", &self.closing)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
