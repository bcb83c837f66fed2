//! Session connectivity finite-state machine (FSM) types.
//!
//! This module defines every state a [`crate::session::Session`] can occupy.
//! State transitions are *not* implemented here — they live in
//! [`crate::session`] — but each legal transition is documented on its state.
//!
//! Connectivity could be tracked with a pair of booleans (connecting /
//! connected) plus the invariant that at most one is ever true.  A single
//! enum makes that invariant structural: there is no representable
//! "connecting and connected" value.

/// All possible states of the session FSM.
///
/// ```text
//  IDLE ──connect() begins──▶ CONNECTING ──handshake ok──▶ CONNECTED
//    ▲                            │                            │
//    │      any connect failure   │                            │
//    └────────────────────────────┴──────────close()───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket exists; initial state.  `close()` returns here from anywhere.
    Idle,
    /// A `connect` call is in flight: resolution, socket setup, or the
    /// write-readiness poll.  Transitions to `Connected` on handshake
    /// success, or back to `Idle` on any failure path.
    Connecting,
    /// Handshake complete; `read`/`write` are permitted.  Leaves only via
    /// `close()` — there is no `Connected → Connecting` transition.
    Connected,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
