//! Cooperative stop signalling for the accept loop.
//!
//! The accept loop never gets terminated from the outside. Instead, any
//! holder of a [`StopSignal`] clone may *request* a stop; the loop observes
//! the request at its next iteration boundary and unwinds on its own. The
//! request is idempotent and sticky: once raised it can never be cleared.
//!
//! # Example
//!
//! ```rust
//! use keryx_server::StopSignal;
//!
//! let stop = StopSignal::new();
//! assert!(!stop.is_requested());
//!
//! stop.request();
//! stop.request(); // harmless repeat
//! assert!(stop.is_requested());
//! ```

use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A sticky, cloneable flag requesting that the accept loop terminate.
///
/// All clones share the same underlying state: requesting a stop through any
/// clone is visible to every other clone, and wakes every task suspended on
/// [`StopSignal::requested`].
#[derive(Debug, Clone)]
pub struct StopSignal {
    /// Whether a stop has been requested.
    requested: Arc<AtomicBool>,

    /// Wakes tasks parked on `requested()`.
    tx: broadcast::Sender<()>,
}

impl StopSignal {
    /// Creates a new signal in the "not requested" state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Requests a stop.
    ///
    /// The first call flips the flag and notifies all waiters; subsequent
    /// calls are no-ops. Never blocks.
    pub fn request(&self) {
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine: late waiters hit the flag fast path.
            let _ = self.tx.send(());
        }
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves when a stop is requested; immediately if it already was.
    pub async fn requested(&self) {
        // Subscribe before checking the flag: `request()` flips the flag
        // before sending, so either the check sees it or the receiver
        // catches the send.
        let mut rx = self.tx.subscribe();
        if self.is_requested() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts connections still in flight so shutdown can drain them.
///
/// Every accepted connection holds a [`ConnGuard`]; the accept loop waits on
/// [`ConnTracker::drained`] (bounded by the configured shutdown timeout)
/// after the stop request is observed.
#[derive(Debug, Clone)]
pub struct ConnTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl ConnTracker {
    /// Creates a tracker with no active connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Registers a connection; drop the guard when it closes.
    #[must_use]
    pub fn track(&self) -> ConnGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnGuard {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Number of connections currently in flight.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolves once every tracked connection has closed.
    pub async fn drained(&self) {
        loop {
            // Register interest before reading the count, so a guard
            // dropped in between still wakes us.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard representing one in-flight connection.
#[derive(Debug)]
pub struct ConnGuard {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}
