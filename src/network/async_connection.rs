//! Async Connection
//!
//! Non-blocking counterpart of [`Connection`](super::Connection), driven by
//! readiness callbacks from an external reactor.
//!
//! ## State Machine
//! ```text
//!   Unregistered ──new()──▶ Registered({read}) ◀──────┐
//!                               │    send() queues     │ outbound
//!                               │    bytes             │ flushed
//!                               ▼                      │
//!                          Registered({read,write}) ───┘
//!                               │
//!              error / disconnect() / drop
//!                               ▼
//!                           TornDown   (deregistered, callbacks are no-ops)
//! ```
//!
//! Read interest stays on for the whole life of the session, since the server
//! may push unsolicited messages. Write interest is on exactly while the
//! outbound buffer holds unsent bytes.
//!
//! ## Follow-up Commands
//! Callbacks run while the connection is mutably borrowed, so they cannot call
//! `send` on it. They queue follow-ups through an [`AsyncSender`] instead;
//! the connection moves those onto the wire, in order, as soon as the
//! current readiness callback has finished dispatching.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::rc::Rc;

use bytes::{Buf, BytesMut};

use crate::config::Config;
use crate::error::{RespError, Result};
use crate::network::connection::connect_tcp;
use crate::network::reactor::{Interest, Reactor, Token};
use crate::protocol::{encode_command_into, Command, DecodeLimits, Reply, ReplyDecoder};

/// A non-blocking byte stream
pub trait AsyncTransport: Read + Write {
    /// Take the pending socket error, if any
    fn take_error(&self) -> io::Result<Option<io::Error>>;
}

impl AsyncTransport for TcpStream {
    fn take_error(&self) -> io::Result<Option<io::Error>> {
        TcpStream::take_error(self)
    }
}

/// Registration state of an async connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    Unregistered,
    Registered(Interest),
    TornDown,
}

impl fmt::Display for AsyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncState::Unregistered => f.write_str("unregistered"),
            AsyncState::Registered(interest) => write!(f, "registered{}", interest),
            AsyncState::TornDown => f.write_str("torn down"),
        }
    }
}

type ReplyCallback = Box<dyn FnOnce(Result<Reply>)>;
type ErrorHandler = Box<dyn FnOnce(&RespError)>;
type PushHandler = Box<dyn FnMut(Reply)>;

/// Commands handed over by an `AsyncSender`, not yet encoded
#[derive(Default)]
struct Deferred {
    commands: VecDeque<(Command, ReplyCallback)>,
    /// Set on teardown; later sends are refused with this reason
    closed: Option<String>,
}

/// Handle for queueing commands on an [`AsyncConnection`] from inside its
/// own callbacks
///
/// Commands queued here go out after everything already sent on the
/// connection, and their replies are dispatched in that order.
#[derive(Clone)]
pub struct AsyncSender {
    deferred: Rc<RefCell<Deferred>>,
}

impl AsyncSender {
    /// Queue a command; `callback` receives its reply or the error that
    /// prevented one
    ///
    /// Returns `Poisoned` without queueing anything once the connection is
    /// torn down.
    pub fn send(
        &self,
        command: &Command,
        callback: impl FnOnce(Result<Reply>) + 'static,
    ) -> Result<()> {
        let mut deferred = self.deferred.borrow_mut();
        if let Some(reason) = &deferred.closed {
            return Err(RespError::Poisoned(reason.clone()));
        }
        deferred
            .commands
            .push_back((command.clone(), Box::new(callback)));
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.deferred.borrow().closed.is_some()
    }
}

impl fmt::Debug for AsyncSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deferred = self.deferred.borrow();
        f.debug_struct("AsyncSender")
            .field("queued", &deferred.commands.len())
            .field("closed", &deferred.closed)
            .finish()
    }
}

/// A reactor-driven client connection
///
/// Callbacks run inside `on_readable` / `on_writable`, on whatever thread
/// drives the reactor. They cannot call back into the connection that is
/// invoking them; follow-up commands go through [`AsyncConnection::sender`].
pub struct AsyncConnection<T: AsyncTransport, R: Reactor<T>> {
    transport: T,
    reactor: R,
    token: Token,
    state: AsyncState,

    /// Why the session was torn down, once it has been
    closed_reason: Option<String>,

    decoder: ReplyDecoder,

    /// Encoded commands not yet accepted by the transport
    outbound: BytesMut,

    /// Reply callbacks in submission order
    pending: VecDeque<ReplyCallback>,

    /// Commands queued through an `AsyncSender`
    deferred: Rc<RefCell<Deferred>>,

    on_error: Option<ErrorHandler>,
    on_push: Option<PushHandler>,

    read_chunk_size: usize,
}

impl<R: Reactor<TcpStream>> AsyncConnection<TcpStream, R> {
    /// Connect to the configured address and register with `reactor`
    ///
    /// The TCP handshake itself blocks (bounded by `connect_timeout_ms`); the
    /// socket is switched to non-blocking mode before registration.
    pub fn connect(config: &Config, reactor: R, token: Token) -> Result<Self> {
        config.validate()?;

        let stream = connect_tcp(config)?;
        stream
            .set_nonblocking(true)
            .map_err(|e| RespError::Connect(e.to_string()))?;
        stream
            .set_nodelay(config.nodelay)
            .map_err(|e| RespError::Connect(e.to_string()))?;

        Self::new(stream, reactor, token, config)
    }
}

impl<T: AsyncTransport, R: Reactor<T>> AsyncConnection<T, R> {
    /// Wrap a non-blocking transport and register it for reads
    pub fn new(transport: T, mut reactor: R, token: Token, config: &Config) -> Result<Self> {
        if let Some(err) = transport
            .take_error()
            .map_err(|e| RespError::Connect(e.to_string()))?
        {
            return Err(RespError::Connect(err.to_string()));
        }

        reactor
            .register(&transport, token, Interest::READABLE)
            .map_err(|e| RespError::Connect(format!("reactor registration failed: {}", e)))?;

        tracing::debug!("Async connection {:?} registered {}", token, Interest::READABLE);

        Ok(Self {
            transport,
            reactor,
            token,
            state: AsyncState::Registered(Interest::READABLE),
            closed_reason: None,
            decoder: ReplyDecoder::new(DecodeLimits::from(config)),
            outbound: BytesMut::with_capacity(1024),
            pending: VecDeque::new(),
            deferred: Rc::default(),
            on_error: None,
            on_push: None,
            read_chunk_size: config.read_chunk_size.max(1),
        })
    }

    /// Handler invoked once when the session is torn down by an error
    pub fn set_error_handler(&mut self, handler: impl FnOnce(&RespError) + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    /// Handler for replies that arrive with no command waiting (pushed messages)
    pub fn set_push_handler(&mut self, handler: impl FnMut(Reply) + 'static) {
        self.on_push = Some(Box::new(handler));
    }

    /// Handle for queueing commands from reply, push or error callbacks
    pub fn sender(&self) -> AsyncSender {
        AsyncSender {
            deferred: self.deferred.clone(),
        }
    }

    /// Queue a command; `callback` receives its reply or the error that
    /// prevented one
    ///
    /// Returns `Poisoned` without queueing anything if the session is already
    /// torn down. Once queued, the outcome is reported through `callback` only.
    /// Must not be called from inside a callback of this connection; use
    /// [`sender`](Self::sender) there.
    pub fn send(
        &mut self,
        command: &Command,
        callback: impl FnOnce(Result<Reply>) + 'static,
    ) -> Result<()> {
        if !matches!(self.state, AsyncState::Registered(_)) {
            return Err(RespError::Poisoned(self.reason()));
        }

        self.flush_deferred();
        encode_command_into(command, &mut self.outbound);
        self.pending.push_back(Box::new(callback));
        tracing::trace!("Async connection {:?} queued: {}", self.token, command);

        if let Err(e) = self.update_interest() {
            self.fail(e);
        }
        Ok(())
    }

    /// Reactor callback: the transport is readable
    pub fn on_readable(&mut self) {
        if !matches!(self.state, AsyncState::Registered(_)) {
            return;
        }

        let mut closed = false;
        loop {
            match self.read_chunk() {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(_) => continue,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(RespError::lost(&e)),
            }
        }

        // Replies that completed before an EOF are still delivered
        loop {
            match self.decoder.decode() {
                Ok(Some(reply)) => self.dispatch(reply),
                Ok(None) => break,
                Err(e) => return self.fail(e),
            }
        }

        // Follow-ups queued by the callbacks above
        self.flush_deferred();

        if closed {
            return self.fail(RespError::ConnectionLost(
                "connection closed by peer".to_string(),
            ));
        }
        if let Err(e) = self.update_interest() {
            self.fail(e);
        }
    }

    /// Reactor callback: the transport is writable
    pub fn on_writable(&mut self) {
        if !matches!(self.state, AsyncState::Registered(_)) {
            return;
        }

        self.flush_deferred();
        while !self.outbound.is_empty() {
            match self.transport.write(&self.outbound) {
                Ok(0) => {
                    return self.fail(RespError::ConnectionLost(
                        "transport accepted zero bytes".to_string(),
                    ))
                }
                Ok(n) => self.outbound.advance(n),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(RespError::lost(&e)),
            }
        }

        if let Err(e) = self.update_interest() {
            self.fail(e);
        }
    }

    /// Tear the session down; replies still owed fail with `ConnectionLost`
    /// and anything the server sends afterwards is discarded
    pub fn disconnect(&mut self) {
        if self.state == AsyncState::TornDown {
            return;
        }
        self.teardown("disconnected by client".to_string());
        self.fail_pending();
    }

    pub fn state(&self) -> AsyncState {
        self.state
    }

    pub fn is_torn_down(&self) -> bool {
        self.state == AsyncState::TornDown
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Number of commands still waiting for a reply
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Bytes queued but not yet written to the transport
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        let buf = self.decoder.buffer_mut();
        let start = buf.len();
        buf.resize(start + self.read_chunk_size, 0);
        let result = self.transport.read(&mut buf[start..]);
        buf.truncate(start + *result.as_ref().unwrap_or(&0));
        result
    }

    fn dispatch(&mut self, reply: Reply) {
        match self.pending.pop_front() {
            Some(callback) => callback(Ok(reply)),
            None => match self.on_push.as_mut() {
                Some(handler) => handler(reply),
                None => tracing::trace!(
                    "Async connection {:?} dropped unsolicited reply: {:?}",
                    self.token,
                    reply
                ),
            },
        }
    }

    /// Encode commands queued through an `AsyncSender` behind what is
    /// already outbound
    fn flush_deferred(&mut self) {
        loop {
            let next = self.deferred.borrow_mut().commands.pop_front();
            let Some((command, callback)) = next else {
                break;
            };
            encode_command_into(&command, &mut self.outbound);
            self.pending.push_back(callback);
            tracing::trace!("Async connection {:?} queued follow-up: {}", self.token, command);
        }
    }

    /// Desired watch set: always read, write while output is queued
    fn desired_interest(&self) -> Interest {
        if self.outbound.is_empty() {
            Interest::READABLE
        } else {
            Interest::READ_WRITE
        }
    }

    /// Bring the reactor registration in line with the buffer state
    fn update_interest(&mut self) -> Result<()> {
        let AsyncState::Registered(current) = self.state else {
            return Ok(());
        };
        let desired = self.desired_interest();
        if current == desired {
            return Ok(());
        }

        self.reactor
            .reregister(&self.transport, self.token, desired)
            .map_err(|e| RespError::lost(&e))?;
        tracing::trace!("Async connection {:?} now watching {}", self.token, desired);
        self.state = AsyncState::Registered(desired);
        Ok(())
    }

    /// Tear down after an error, then notify pending callbacks and the
    /// error handler
    fn fail(&mut self, err: RespError) {
        if self.state == AsyncState::TornDown {
            return;
        }
        tracing::warn!("Async connection {:?} torn down: {}", self.token, err);
        self.teardown(err.to_string());
        self.fail_pending();
        if let Some(handler) = self.on_error.take() {
            handler(&err);
        }
    }

    fn fail_pending(&mut self) {
        let reason = self.reason();
        for callback in std::mem::take(&mut self.pending) {
            callback(Err(RespError::ConnectionLost(reason.clone())));
        }
        // Callbacks may still hold a sender, so release the queue before
        // running them
        let deferred = std::mem::take(&mut self.deferred.borrow_mut().commands);
        for (_, callback) in deferred {
            callback(Err(RespError::ConnectionLost(reason.clone())));
        }
    }

    fn teardown(&mut self, reason: String) {
        if let AsyncState::Registered(_) = self.state {
            if let Err(e) = self.reactor.deregister(&self.transport, self.token) {
                tracing::debug!("Async connection {:?} deregister failed: {}", self.token, e);
            }
        }
        tracing::debug!("Async connection {:?} {} -> torn down", self.token, self.state);
        self.state = AsyncState::TornDown;
        self.deferred.borrow_mut().closed = Some(reason.clone());
        self.closed_reason = Some(reason);
        self.outbound.clear();
        self.decoder.clear();
    }

    fn reason(&self) -> String {
        self.closed_reason
            .clone()
            .unwrap_or_else(|| format!("connection is {}", self.state))
    }
}

impl<T: AsyncTransport, R: Reactor<T>> Drop for AsyncConnection<T, R> {
    fn drop(&mut self) {
        if self.state != AsyncState::TornDown {
            self.teardown("connection dropped".to_string());
            self.fail_pending();
        }
    }
}
