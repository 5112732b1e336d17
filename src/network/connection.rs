//! Blocking Connection
//!
//! Owns one transport session and turns commands into replies, one blocking
//! round-trip at a time.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;

use crate::config::Config;
use crate::error::{RespError, Result};
use crate::network::Pipeline;
use crate::protocol::{encode_command_into, Command, DecodeLimits, FromReply, Reply, ReplyDecoder};

/// Lifecycle of a session. `Closed` is permanent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Closed after a fatal error; holds the error message
    Closed(String),
}

/// A blocking client connection
///
/// Any transport failure or undecodable byte stream poisons the connection:
/// the failing call reports the error, and every later call fails with
/// `RespError::Poisoned` without touching the transport.
pub struct Connection<T = TcpStream> {
    /// Byte-stream transport (a TCP socket outside of tests)
    transport: T,

    /// Received bytes not yet consumed by a reply
    decoder: ReplyDecoder,

    /// Encoding scratch buffer, reused across commands
    write_buf: BytesMut,

    /// Bytes requested per read call
    read_chunk_size: usize,

    state: SessionState,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection<TcpStream> {
    /// Connect to the configured address
    ///
    /// Fails with `Connect` if no stream can be established or if the socket
    /// reports an error straight after establishment.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let stream = connect_tcp(config)?;

        // Disable Nagle's algorithm for low latency
        stream
            .set_nodelay(config.nodelay)
            .map_err(|e| RespError::Connect(e.to_string()))?;
        stream
            .set_read_timeout(config.read_timeout())
            .map_err(|e| RespError::Connect(e.to_string()))?;
        stream
            .set_write_timeout(config.write_timeout())
            .map_err(|e| RespError::Connect(e.to_string()))?;

        if let Some(err) = stream
            .take_error()
            .map_err(|e| RespError::Connect(e.to_string()))?
        {
            return Err(RespError::Connect(err.to_string()));
        }

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| config.addr.clone());

        tracing::debug!("Connection established to {}", peer_addr);

        let mut conn = Self::from_transport(stream, config);
        conn.peer_addr = peer_addr;
        Ok(conn)
    }

    /// Connect to `addr` with default settings
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::open(&Config::builder().addr(addr).build())
    }
}

/// Resolve the configured address and connect to the first reachable candidate
pub(crate) fn connect_tcp(config: &Config) -> Result<TcpStream> {
    let addrs = config
        .addr
        .to_socket_addrs()
        .map_err(|e| RespError::Connect(format!("{}: {}", config.addr, e)))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(RespError::Connect(match last_err {
        Some(e) => format!("{}: {}", config.addr, e),
        None => format!("{}: address resolved to nothing", config.addr),
    }))
}

impl<T: Read + Write> Connection<T> {
    /// Wrap an already established transport
    pub fn from_transport(transport: T, config: &Config) -> Self {
        Self {
            transport,
            decoder: ReplyDecoder::new(DecodeLimits::from(config)),
            write_buf: BytesMut::with_capacity(1024),
            read_chunk_size: config.read_chunk_size.max(1),
            state: SessionState::Open,
            peer_addr: config.addr.clone(),
        }
    }

    /// Send a command and block until its reply is decoded
    ///
    /// A remote error status (`-ERR ...`) is returned as a reply, not as an
    /// error; the typed projections surface it as `RespError::Remote`.
    pub fn send(&mut self, command: &Command) -> Result<Reply> {
        self.append(command)?;
        self.drain_one()
    }

    /// Send a command and convert its reply
    pub fn query<R: FromReply>(&mut self, command: &Command) -> Result<R> {
        self.send(command)?.typed()
    }

    /// Encode and transmit a command without reading its reply
    pub fn append(&mut self, command: &Command) -> Result<()> {
        self.ensure_open()?;

        self.write_buf.clear();
        encode_command_into(command, &mut self.write_buf);
        tracing::trace!("Sending to {}: {}", self.peer_addr, command);

        let written = self
            .transport
            .write_all(&self.write_buf)
            .and_then(|_| self.transport.flush());
        if let Err(e) = written {
            return Err(self.poison(RespError::lost(&e)));
        }
        Ok(())
    }

    /// Block until exactly one reply is decoded
    pub fn drain_one(&mut self) -> Result<Reply> {
        self.ensure_open()?;

        loop {
            match self.decoder.decode() {
                Ok(Some(reply)) => return Ok(reply),
                Ok(None) => self.fill()?,
                Err(e) => return Err(self.poison(e)),
            }
        }
    }

    /// Start a pipeline over this connection
    pub fn pipeline(&mut self) -> Pipeline<'_, T> {
        Pipeline::new(self)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Borrow the underlying transport
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Read one chunk from the transport into the decoder
    fn fill(&mut self) -> Result<()> {
        let buf = self.decoder.buffer_mut();
        let start = buf.len();
        buf.resize(start + self.read_chunk_size, 0);

        loop {
            match self.transport.read(&mut buf[start..]) {
                Ok(0) => {
                    buf.truncate(start);
                    let err = RespError::ConnectionLost("connection closed by peer".to_string());
                    return Err(self.poison(err));
                }
                Ok(n) => {
                    buf.truncate(start + n);
                    return Ok(());
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    buf.truncate(start);
                    return Err(self.poison(RespError::lost(&e)));
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match &self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed(reason) => Err(RespError::Poisoned(reason.clone())),
        }
    }

    /// Close the session for good and hand the error back
    fn poison(&mut self, err: RespError) -> RespError {
        tracing::warn!("Connection to {} closed after error: {}", self.peer_addr, err);
        self.state = SessionState::Closed(err.to_string());
        self.decoder.clear();
        self.write_buf.clear();
        err
    }
}
