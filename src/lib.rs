//! `tcp-session` — a blocking TCP client with poll-bounded connect and read.
//!
//! One [`Session`] owns one TCP endpoint and exposes a small synchronous
//! surface: `connect`, `read(n)`, `write(data)`, `close`, plus setters for
//! the poll timeout and debug logging.  Every operation runs to completion
//! (or to its bounded timeout) on the calling thread.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────────────────────────┐
//!  │             Session               │
//!  │  (owns state machine + socket)    │
//!  └──────┬──────────────────┬─────────┘
//!         │ hostname         │ raw syscalls
//!  ┌──────▼───────┐   ┌──────▼───────┐
//!  │ HostResolver │   │    Socket    │
//!  │ (getaddrinfo │   │ (RAII fd:    │
//!  │  + bounded   │   │  poll, recv, │
//!  │  retry)      │   │  send)       │
//!  └──────────────┘   └──────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`session`] — lifecycle, guarded read/write loops, error taxonomy
//! - [`state`]   — finite-state-machine types
//! - [`resolve`] — classified hostname resolution with transient retry
//! - [`socket`]  — thin RAII wrapper over the raw descriptor

pub mod resolve;
pub mod session;
pub mod socket;
pub mod state;

pub use resolve::{HostResolver, ResolveError, MAX_TRANSIENT_RETRIES};
pub use session::{Payload, ReadOutcome, Session, SessionError, DEFAULT_POLL_TIMEOUT};
pub use socket::{PollStatus, Socket};
pub use state::SessionState;
