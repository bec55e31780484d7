//! One-shot publication of the running server to other threads.
//!
//! The server is constructed on its own thread, after the rest of the
//! process is already running. Anything that wants to reach it from outside
//! that thread (most importantly the shutdown endpoint, which runs inside
//! the server's own dispatch) goes through a [`ServerRegistry`]: a shared
//! cell that starts empty, is filled exactly once by the startup routine,
//! and flips a readiness latch only *after* the fill.
//!
//! The ordering is the whole point. Publication happens-before the latch is
//! raised, so any reader that observes [`ServerRegistry::is_ready`] as
//! `true` is guaranteed to find a handle in the slot. There is no
//! check-then-use race to paper over in callers.
//!
//! # Example
//!
//! ```rust
//! use keryx_server::{ServerHandle, ServerRegistry, StopRequest, StopSignal};
//!
//! let registry = ServerRegistry::new();
//!
//! // Before the startup routine publishes, a stop request is a no-op.
//! assert_eq!(registry.request_stop(), StopRequest::NotReady);
//!
//! let stop = StopSignal::new();
//! registry.publish(ServerHandle::new(stop.clone(), "127.0.0.1:5000".parse().unwrap()));
//!
//! assert!(registry.is_ready());
//! assert_eq!(registry.request_stop(), StopRequest::Stopping);
//! assert!(stop.is_requested());
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::shutdown::StopSignal;

/// A cloneable reference to a running (or about to run) server.
///
/// Holders may request a stop or read the bound address; they never own the
/// server itself.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    stop: StopSignal,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Creates a handle from the server's stop signal and bound address.
    #[must_use]
    pub fn new(stop: StopSignal, local_addr: SocketAddr) -> Self {
        Self { stop, local_addr }
    }

    /// The address the server is listening on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the server's accept loop to terminate. Idempotent, non-blocking.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop.is_requested()
    }
}

/// Outcome of [`ServerRegistry::request_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// The server has not been published yet; nothing was signalled.
    /// This is a defined outcome, not an error.
    NotReady,

    /// The stop flag was set (or was already set). The accept loop will
    /// observe it at its next iteration boundary.
    Stopping,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Filled exactly once by the startup routine, before `ready` flips.
    slot: Mutex<Option<ServerHandle>>,

    /// Monotonic readiness latch. Never cleared once set.
    ready: AtomicBool,
}

/// Shared, thread-safe cell through which the startup routine publishes the
/// server and the shutdown endpoint reaches it.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    inner: Arc<RegistryInner>,
}

impl ServerRegistry {
    /// Creates an empty registry with the readiness latch unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the server handle and then raises the readiness latch.
    ///
    /// Exactly-once semantics: the first call wins. A repeated call keeps
    /// the original handle and logs a warning rather than failing, since the
    /// caller can do nothing useful with such an error.
    pub fn publish(&self, handle: ServerHandle) {
        let mut slot = self.inner.slot.lock();
        if slot.is_some() {
            tracing::warn!("server handle already published, ignoring repeat publication");
            return;
        }
        *slot = Some(handle);
        drop(slot);

        // Release pairs with the Acquire in `is_ready`: a reader that sees
        // the latch set also sees the slot filled.
        self.inner.ready.store(true, Ordering::Release);
    }

    /// Returns `true` once the server has been published.
    ///
    /// Non-blocking and callable from any thread. When this returns `true`,
    /// [`ServerRegistry::current`] is guaranteed to return `Some`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Returns the published handle, or `None` before publication.
    #[must_use]
    pub fn current(&self) -> Option<ServerHandle> {
        self.inner.slot.lock().clone()
    }

    /// Requests that the published server stop.
    ///
    /// Before publication this is a defined no-op returning
    /// [`StopRequest::NotReady`]; the stop flag is not touched. After
    /// publication it flips the flag (idempotently) and returns
    /// [`StopRequest::Stopping`]. Never blocks waiting for the accept loop
    /// to actually exit.
    pub fn request_stop(&self) -> StopRequest {
        if !self.is_ready() {
            return StopRequest::NotReady;
        }

        match self.current() {
            Some(handle) => {
                handle.request_stop();
                StopRequest::Stopping
            }
            None => StopRequest::NotReady,
        }
    }
}
