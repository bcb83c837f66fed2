//! Hostname resolution with classified failures and bounded transient retry.
//!
//! The session resolves hostnames through a [`HostResolver`], which defaults
//! to `getaddrinfo(3)` restricted to IPv4 stream addresses.  Failures are
//! classified so callers can tell "this name does not exist" apart from "the
//! resolver is momentarily overloaded": only the latter ([`ResolveError::TryAgain`])
//! is retried, up to [`MAX_TRANSIENT_RETRIES`] times.
//!
//! Like the cache layer in a recursive resolver, the backend is pluggable so
//! tests can script resolution outcomes without touching the network.

use std::ffi::{CStr, CString};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::{mem, ptr};

use thiserror::Error;

/// Retries on transient (`EAI_AGAIN`) resolution failures.
///
/// With the initial attempt this allows 4 resolution calls in total.
pub const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Errors that can arise from hostname resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The name does not exist (`EAI_NONAME`).  Never retried.
    #[error("host not found: {0}")]
    NotFound(String),
    /// The name exists but yielded no usable IPv4 address.  Never retried.
    #[error("host has no usable address: {0}")]
    NoAddress(String),
    /// Transient resolver failure (`EAI_AGAIN`); a retry may succeed.
    #[error("transient resolver failure, try again")]
    TryAgain,
    /// Transient failures persisted past the retry budget.
    #[error("resolution still failing after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    /// Any other, non-retryable resolver failure.
    #[error("resolver failure: {0}")]
    Failed(String),
}

/// Backend signature: resolve a hostname to its full IPv4 address list.
pub type BackendFn = dyn Fn(&str) -> Result<Vec<Ipv4Addr>, ResolveError> + Send + Sync;

/// Hostname resolver with an optional scripted backend.
#[derive(Clone)]
pub struct HostResolver {
    backend: Option<Arc<BackendFn>>,
}

impl HostResolver {
    /// Default resolver using the system's `getaddrinfo`.
    pub fn new() -> Self {
        Self { backend: None }
    }

    /// Resolver with a mock backend (used by tests to script outcomes).
    pub fn with_backend(backend: Box<BackendFn>) -> Self {
        Self {
            backend: Some(Arc::from(backend)),
        }
    }

    /// Resolve `host` to a single IPv4 address.
    ///
    /// Transient failures are retried up to [`MAX_TRANSIENT_RETRIES`] times;
    /// every other classification fails on the first attempt.  When the
    /// backend returns several addresses the first one always wins — there is
    /// no round-robin and no fallback to secondary addresses.
    pub fn resolve(&self, host: &str) -> Result<Ipv4Addr, ResolveError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let result = match &self.backend {
                Some(backend) => backend(host),
                None => lookup_ipv4(host),
            };
            match result {
                Ok(addrs) => {
                    return addrs
                        .first()
                        .copied()
                        .ok_or_else(|| ResolveError::NoAddress(host.to_string()));
                }
                Err(ResolveError::TryAgain) if attempts <= MAX_TRANSIENT_RETRIES => continue,
                Err(ResolveError::TryAgain) => {
                    return Err(ResolveError::RetriesExhausted { attempts });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostResolver")
            .field("backend", &self.backend.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// System backend: `getaddrinfo` with IPv4/stream hints, classified.
fn lookup_ipv4(host: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
    let c_host = CString::new(host)
        .map_err(|_| ResolveError::Failed("host contains NUL byte".to_string()))?;

    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = libc::AF_INET;
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut list: *mut libc::addrinfo = ptr::null_mut();
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), ptr::null(), &hints, &mut list) };
    match rc {
        0 => {}
        libc::EAI_AGAIN => return Err(ResolveError::TryAgain),
        libc::EAI_NONAME => return Err(ResolveError::NotFound(host.to_string())),
        _ => return Err(ResolveError::Failed(gai_message(rc))),
    }

    let mut addrs = Vec::new();
    let mut cur = list;
    while !cur.is_null() {
        let entry = unsafe { &*cur };
        if entry.ai_family == libc::AF_INET && !entry.ai_addr.is_null() {
            let sin = unsafe { &*(entry.ai_addr as *const libc::sockaddr_in) };
            addrs.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
        }
        cur = entry.ai_next;
    }
    unsafe { libc::freeaddrinfo(list) };

    if addrs.is_empty() {
        return Err(ResolveError::NoAddress(host.to_string()));
    }
    Ok(addrs)
}

/// Human-readable text for a non-zero `getaddrinfo` return code.
fn gai_message(rc: libc::c_int) -> String {
    let msg = unsafe { CStr::from_ptr(libc::gai_strerror(rc)) };
    format!("{} (gai error {rc})", msg.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn numeric_host_resolves_without_network() {
        let resolver = HostResolver::new();
        let addr = resolver.resolve("127.0.0.1").expect("numeric resolve");
        assert_eq!(addr, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn nul_in_host_is_rejected() {
        let resolver = HostResolver::new();
        let err = resolver.resolve("bad\0host").unwrap_err();
        assert!(matches!(err, ResolveError::Failed(_)));
    }

    #[test]
    fn first_address_wins() {
        let resolver = HostResolver::with_backend(Box::new(|_| {
            Ok(vec![
                Ipv4Addr::new(192, 0, 2, 1),
                Ipv4Addr::new(192, 0, 2, 2),
            ])
        }));
        assert_eq!(
            resolver.resolve("example.test").unwrap(),
            Ipv4Addr::new(192, 0, 2, 1)
        );
    }

    #[test]
    fn empty_address_list_is_no_address() {
        let resolver = HostResolver::with_backend(Box::new(|_| Ok(vec![])));
        assert_eq!(
            resolver.resolve("empty.test").unwrap_err(),
            ResolveError::NoAddress("empty.test".to_string())
        );
    }

    #[test]
    fn not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let resolver = HostResolver::with_backend(Box::new(move |host| {
            counted.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::NotFound(host.to_string()))
        }));
        let err = resolver.resolve("missing.test").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_again_twice_then_success_takes_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let resolver = HostResolver::with_backend(Box::new(move |_| {
            match counted.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(ResolveError::TryAgain),
                _ => Ok(vec![Ipv4Addr::new(198, 51, 100, 7)]),
            }
        }));
        assert_eq!(
            resolver.resolve("flaky.test").unwrap(),
            Ipv4Addr::new(198, 51, 100, 7)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3, "no fourth attempt expected");
    }

    #[test]
    fn permanent_try_again_exhausts_after_four_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let resolver = HostResolver::with_backend(Box::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::TryAgain)
        }));
        let err = resolver.resolve("overloaded.test").unwrap_err();
        assert_eq!(err, ResolveError::RetriesExhausted { attempts: 4 });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
