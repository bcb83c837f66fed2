//! The socket session: one TCP endpoint, blocking-with-timeout operations.
//!
//! A [`Session`] owns at most one connection at a time and runs every
//! operation to completion (or to its bounded timeout) on the calling
//! thread.  There is no background I/O and no internal locking; exclusive
//! access is enforced by `&mut self`.
//!
//! Lifecycle: `Idle → Connecting → Connected`, with every connect failure
//! path and `close()` unwinding back to `Idle`.  See [`crate::state`].

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::resolve::{HostResolver, ResolveError};
use crate::socket::{PollStatus, Socket};
use crate::state::SessionState;

/// Default bound for connect-readiness and read-readiness polls.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A dynamically checkable argument problem (e.g. empty hostname).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// `connect` called while another connect is in flight.
    #[error("already connecting")]
    AlreadyConnecting,
    /// `connect` called on an established session.
    #[error("already connected")]
    AlreadyConnected,
    /// `read`/`write` called without an established connection.
    #[error("not connected")]
    NotConnected,
    /// Hostname resolution failed (transient retries already exhausted).
    #[error("name resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    /// The OS refused to create a socket.
    #[error("socket creation failed: {0}")]
    SocketCreation(#[source] io::Error),
    /// The socket could not be configured (non-blocking mode).
    #[error("socket configuration failed: {0}")]
    SocketConfig(#[source] io::Error),
    /// The TCP handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    /// A readiness poll exceeded the configured timeout.
    #[error("poll timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// A send or receive failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
    /// The peer closed the connection mid-read.
    #[error("connection reset by peer")]
    ConnectionReset,
}

/// Outbound payload: text is sent as its UTF-8 bytes.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Text, encoded as UTF-8 on the wire.
    Text(&'a str),
    /// Raw bytes, sent as-is.
    Bytes(&'a [u8]),
}

impl Payload<'_> {
    /// The wire representation of this payload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Bytes(b) => b,
        }
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(s: &'a str) -> Self {
        Payload::Text(s)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(s: &'a String) -> Self {
        Payload::Text(s)
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(b: &'a [u8]) -> Self {
        Payload::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        Payload::Bytes(b)
    }
}

/// What a single `read` call produced.
///
/// A read can stop early and *still* hand back data: a short read is not
/// fatal to the bytes already accumulated, only to completing the full
/// request.  Both channels live in one struct — `data` holds whatever
/// arrived before the stop condition, `error` holds the stop condition
/// itself when the full request did not complete.
#[derive(Debug)]
pub struct ReadOutcome {
    /// The accumulated bytes, exactly as many as arrived.  `None` when zero
    /// bytes were accumulated before the loop stopped.
    pub data: Option<Vec<u8>>,
    /// Why the loop stopped short, if it did.  `None` means the full
    /// requested count was read.
    pub error: Option<SessionError>,
}

impl ReadOutcome {
    /// True when the full requested byte count arrived.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Number of bytes accumulated.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// True when no bytes were accumulated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A blocking TCP client session.
///
/// ```no_run
/// use std::time::Duration;
/// use tcp_session::Session;
///
/// let mut session = Session::new();
/// session.set_poll_timeout(Duration::from_secs(5));
/// session.connect("127.0.0.1", 2828)?;
/// session.write("hello")?;
/// let outcome = session.read(64)?;
/// if let Some(bytes) = outcome.data {
///     println!("got {} bytes", bytes.len());
/// }
/// session.close();
/// # Ok::<(), tcp_session::SessionError>(())
/// ```
#[derive(Debug)]
pub struct Session {
    socket: Option<Socket>,
    state: SessionState,
    poll_timeout: Duration,
    debug: bool,
    resolver: HostResolver,
}

impl Session {
    /// A fresh, idle session with the default poll timeout and the system
    /// resolver.
    pub fn new() -> Self {
        Self::with_resolver(HostResolver::new())
    }

    /// A session using the given resolver (tests inject stub backends here).
    pub fn with_resolver(resolver: HostResolver) -> Self {
        Self {
            socket: None,
            state: SessionState::Idle,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            debug: false,
            resolver,
        }
    }

    /// Current FSM state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a `connect` call is in flight.
    pub fn is_connecting(&self) -> bool {
        self.state == SessionState::Connecting
    }

    /// True once a connect attempt has succeeded.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// The bound applied to connect-readiness and read-readiness polls.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Replace the poll timeout for subsequent operations.
    ///
    /// Does not affect an operation already in flight.
    pub fn set_poll_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.poll_timeout = timeout;
        self
    }

    /// Toggle per-session debug diagnostics (routed through the `log` facade).
    pub fn set_debug_log(&mut self, enabled: bool) -> &mut Self {
        self.debug = enabled;
        if enabled {
            log::debug!(target: "tcp_session", "debug log enabled");
        }
        self
    }

    /// Establish a TCP connection to `host:port`.
    ///
    /// Resolves the host (retrying transient failures, bounded), creates an
    /// IPv4 stream socket, issues a non-blocking connect, and waits for
    /// write-readiness within the poll timeout.  Any failure fully unwinds
    /// the session to `Idle` with the socket closed.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<&mut Self, SessionError> {
        if host.is_empty() {
            return Err(SessionError::InvalidArgument(
                "host must not be empty".to_string(),
            ));
        }
        match self.state {
            SessionState::Connecting => return Err(SessionError::AlreadyConnecting),
            SessionState::Connected => return Err(SessionError::AlreadyConnected),
            SessionState::Idle => {}
        }

        self.state = SessionState::Connecting;
        match self.do_connect(host, port) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.state = SessionState::Connected;
                self.debug_log(format_args!("connected to {host}:{port}"));
                Ok(self)
            }
            Err(e) => {
                // The handshake socket (if any) was dropped on the error
                // path; reset the FSM so the session is reusable.
                self.close();
                Err(e)
            }
        }
    }

    /// The fallible stretch of `connect`.  The socket lives on the stack
    /// until the handshake completes, so every `?` closes it on the way out.
    fn do_connect(&mut self, host: &str, port: u16) -> Result<Socket, SessionError> {
        let addr = self.resolver.resolve(host)?;
        self.debug_log(format_args!("resolved {host} to {addr}"));

        let socket = Socket::new_tcp().map_err(SessionError::SocketCreation)?;
        socket.set_nonblocking().map_err(SessionError::SocketConfig)?;

        let finished = socket
            .start_connect(addr, port)
            .map_err(SessionError::Connect)?;
        if !finished {
            match socket
                .poll_writable(self.poll_timeout)
                .map_err(SessionError::Connect)?
            {
                PollStatus::Ready => {}
                PollStatus::TimedOut => {
                    return Err(SessionError::Timeout(self.poll_timeout));
                }
                PollStatus::Error => {
                    let cause = socket
                        .take_error()
                        .unwrap_or(None)
                        .unwrap_or_else(|| io::Error::other("handshake failed"));
                    return Err(SessionError::Connect(cause));
                }
            }
        }
        Ok(socket)
    }

    /// Read up to `count` bytes, polling for readiness before each receive.
    ///
    /// The loop stops when the full count has arrived, the poll times out,
    /// the peer resets, or a receive fails.  A stop condition is *not* fatal
    /// to the data already accumulated: a short read still returns those
    /// bytes alongside the error (see [`ReadOutcome`]).
    ///
    /// A `WouldBlock` receive after a positive poll re-polls without
    /// consuming any budget; each spin re-arms the bounded poll, so a silent
    /// peer still times out.
    pub fn read(&mut self, count: usize) -> Result<ReadOutcome, SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let socket = self.socket.as_ref().ok_or(SessionError::NotConnected)?;
        let timeout = self.poll_timeout;

        let mut buf = vec![0u8; count];
        let mut filled = 0usize;
        let mut stop: Option<SessionError> = None;

        while filled < count {
            match socket.poll_readable(timeout) {
                Ok(PollStatus::Ready) => {}
                Ok(PollStatus::TimedOut) => {
                    stop = Some(SessionError::Timeout(timeout));
                    break;
                }
                Ok(PollStatus::Error) => {
                    stop = Some(SessionError::Io(io::Error::other(
                        "socket error while polling for read-readiness",
                    )));
                    break;
                }
                Err(e) => {
                    stop = Some(SessionError::Io(e));
                    break;
                }
            }
            match socket.recv(&mut buf[filled..]) {
                Ok(0) => {
                    stop = Some(SessionError::ConnectionReset);
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    stop = Some(SessionError::Io(e));
                    break;
                }
            }
        }

        if let Some(err) = &stop {
            self.debug_log(format_args!(
                "read stopped after {filled}/{count} bytes: {err}"
            ));
        }
        buf.truncate(filled);
        let data = if filled > 0 { Some(buf) } else { None };
        Ok(ReadOutcome { data, error: stop })
    }

    /// Send the whole payload.
    ///
    /// Sends are issued directly, with no readiness poll; any send failure
    /// (including a would-block on the non-blocking socket) aborts with
    /// [`SessionError::Io`].
    pub fn write<'a>(&mut self, payload: impl Into<Payload<'a>>) -> Result<&mut Self, SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let socket = self.socket.as_ref().ok_or(SessionError::NotConnected)?;
        let bytes = payload.into();
        let bytes = bytes.as_bytes();

        let mut sent = 0usize;
        while sent < bytes.len() {
            match socket.send(&bytes[sent..]) {
                Ok(n) => sent += n,
                Err(e) => return Err(SessionError::Io(e)),
            }
        }
        self.debug_log(format_args!("wrote {sent} bytes"));
        Ok(self)
    }

    /// Release the socket (if any) and reset to `Idle`.
    ///
    /// Idempotent and infallible; a failing `close(2)` is ignored.
    pub fn close(&mut self) -> &mut Self {
        if self.socket.take().is_some() {
            self.debug_log(format_args!("socket closed"));
        }
        self.state = SessionState::Idle;
        self
    }

    fn debug_log(&self, args: fmt::Arguments<'_>) {
        if self.debug {
            log::debug!(target: "tcp_session", "{args}");
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::HostResolver;
    use std::net::Ipv4Addr;

    #[test]
    fn new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_connecting());
        assert!(!session.is_connected());
        assert_eq!(session.poll_timeout(), DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn read_on_idle_session_fails_not_connected() {
        let mut session = Session::new();
        let err = session.read(16).unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[test]
    fn write_on_idle_session_fails_not_connected() {
        let mut session = Session::new();
        let err = session.write("data").unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[test]
    fn empty_host_is_rejected_before_any_state_change() {
        let mut session = Session::new();
        let err = session.connect("", 80).unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn resolution_failure_unwinds_to_idle() {
        let resolver = HostResolver::with_backend(Box::new(|host| {
            Err(crate::resolve::ResolveError::NotFound(host.to_string()))
        }));
        let mut session = Session::with_resolver(resolver);
        let err = session.connect("missing.test", 80).unwrap_err();
        assert!(matches!(err, SessionError::Resolve(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn close_is_idempotent_on_idle_session() {
        let mut session = Session::new();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn setters_chain() {
        let mut session = Session::new();
        session
            .set_poll_timeout(Duration::from_millis(250))
            .set_debug_log(false);
        assert_eq!(session.poll_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn payload_text_encodes_utf8() {
        let payload: Payload<'_> = "héllo".into();
        assert_eq!(payload.as_bytes(), "héllo".as_bytes());
    }

    #[test]
    fn payload_bytes_pass_through() {
        let raw = [0u8, 159, 146, 150];
        let payload: Payload<'_> = (&raw[..]).into();
        assert_eq!(payload.as_bytes(), &raw);
    }

    #[test]
    fn state_error_messages_match_contract() {
        assert_eq!(SessionError::AlreadyConnecting.to_string(), "already connecting");
        assert_eq!(SessionError::AlreadyConnected.to_string(), "already connected");
        assert_eq!(SessionError::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn first_resolved_address_is_used() {
        // The backend returns two addresses; connect must try the first.
        // 127.0.0.1 first means the loopback connect below can succeed even
        // though the second address is unroutable.
        let resolver = HostResolver::with_backend(Box::new(|_| {
            Ok(vec![Ipv4Addr::LOCALHOST, Ipv4Addr::new(203, 0, 113, 1)])
        }));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let mut session = Session::with_resolver(resolver);
        session.connect("any.test", port).expect("loopback connect");
        assert!(session.is_connected());
        session.close();
    }
}
