//! Thin RAII wrapper around a raw IPv4 stream socket.
//!
//! [`Socket`] owns exactly one file descriptor and exposes the handful of
//! syscalls the session needs: non-blocking mode, connect initiation,
//! single-descriptor readiness polls, `recv`/`send`, and the pending
//! `SO_ERROR`.  All lifecycle policy lives elsewhere; this module owns only
//! the descriptor and the raw calls against it.
//!
//! Dropping a `Socket` closes the descriptor.  A failing `close(2)` is
//! ignored — there is nothing useful a caller could do with it.

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::time::Duration;

#[cfg(target_os = "linux")]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(target_os = "linux"))]
const SEND_FLAGS: libc::c_int = 0;

/// Outcome of a bounded readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The descriptor reported the requested readiness.
    Ready,
    /// The timeout elapsed with no events.
    TimedOut,
    /// The descriptor reported an error, hangup, or an unexpected readiness
    /// combination instead of the requested one.
    Error,
}

/// An owned, raw `AF_INET`/`SOCK_STREAM` descriptor.
#[derive(Debug)]
pub struct Socket {
    fd: RawFd,
}

impl Socket {
    /// Create a new IPv4 TCP socket.
    pub fn new_tcp() -> io::Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Put the descriptor into non-blocking mode.
    ///
    /// Preserves existing status flags (F_GETFL first, then OR in O_NONBLOCK).
    pub fn set_nonblocking(&self) -> io::Result<()> {
        let flags = unsafe { libc::fcntl(self.fd, libc::F_GETFL, 0) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let rc = unsafe { libc::fcntl(self.fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Initiate a connect to `addr:port`.
    ///
    /// Returns `Ok(true)` if the connect completed synchronously, `Ok(false)`
    /// if it is in flight (`EINPROGRESS`) and the caller must poll for
    /// write-readiness, and `Err` for any other synchronous failure.
    pub fn start_connect(&self, addr: Ipv4Addr, port: u16) -> io::Result<bool> {
        let sin = sockaddr_in(addr, port);
        let rc = unsafe {
            libc::connect(
                self.fd,
                &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINPROGRESS) {
            Ok(false)
        } else {
            Err(err)
        }
    }

    /// Wait up to `timeout` for the descriptor to become readable.
    pub fn poll_readable(&self, timeout: Duration) -> io::Result<PollStatus> {
        self.poll(libc::POLLIN, timeout)
    }

    /// Wait up to `timeout` for the descriptor to become writable.
    pub fn poll_writable(&self, timeout: Duration) -> io::Result<PollStatus> {
        self.poll(libc::POLLOUT, timeout)
    }

    fn poll(&self, events: libc::c_short, timeout: Duration) -> io::Result<PollStatus> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if rc == 0 {
            return Ok(PollStatus::TimedOut);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Ok(PollStatus::Error);
        }
        if pfd.revents & events != 0 {
            return Ok(PollStatus::Ready);
        }
        // Events fired but not the ones we asked for.
        Ok(PollStatus::Error)
    }

    /// Receive into `buf`, returning the number of bytes read (0 = peer
    /// closed).  `WouldBlock` surfaces as an `io::Error` of that kind.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Send from `buf`, returning the number of bytes accepted by the kernel.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::send(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                SEND_FLAGS,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Read and clear the pending socket error (`SO_ERROR`).
    ///
    /// After a poll reports an error condition during a non-blocking connect,
    /// this yields the underlying cause (e.g. `ECONNREFUSED`).
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if err == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(err)))
        }
    }

    /// The raw descriptor (diagnostics only).
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        // Close failure is intentionally ignored.
        unsafe {
            let _ = libc::close(self.fd);
        }
    }
}

/// Build an IPv4 socket address in network byte order.
fn sockaddr_in(addr: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = port.to_be();
    sin.sin_addr = libc::in_addr {
        s_addr: u32::from(addr).to_be(),
    };
    sin
}
