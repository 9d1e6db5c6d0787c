//! Shared shutdown state of a running server.
//!
//! Every shutdown trigger (interrupt signal, a client's `Shutdown` request,
//! [`ServerHandle::stop`](super::ServerHandle::stop)) goes through one
//! [`Lifecycle`]. Requesting shutdown is idempotent and wakes the acceptor;
//! [`Lifecycle::teardown`] removes the socket path exactly once no matter how
//! many triggers race to call it, and releases the interrupt registration
//! with it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use mio::Waker;

use crate::net::remove_stale;
use crate::trace::{debug, info, warn};

use super::interrupt::InterruptRegistration;

pub struct Lifecycle {
    shutdown: AtomicBool,
    torn_down: AtomicBool,
    /// Interrupts the acceptor's poll.
    waker: Waker,
    socket_path: PathBuf,
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
    interrupt: Mutex<Option<InterruptRegistration>>,
}

impl Lifecycle {
    pub(crate) fn new(waker: Waker, socket_path: PathBuf) -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            waker,
            socket_path,
            stopped: Mutex::new(false),
            stopped_cv: Condvar::new(),
            interrupt: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Asks the acceptor to stop. Later calls are no-ops.
    pub fn request_shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("shutdown requested");
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake acceptor");
        }
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Removes the socket path. Returns `true` only for the call that did it.
    pub fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(path = %self.socket_path.display(), "shutting down wserver");
        if let Err(e) = remove_stale(&self.socket_path) {
            warn!(path = %self.socket_path.display(), error = %e, "failed to remove socket");
        }
        let interrupt = self
            .interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(registration) = interrupt {
            registration.release();
        }
        true
    }

    /// Hands the SIGINT registration to teardown. Released at once if the
    /// server is already torn down.
    pub(crate) fn attach_interrupt(&self, registration: InterruptRegistration) {
        let mut slot = self.interrupt.lock().unwrap_or_else(PoisonError::into_inner);
        if self.torn_down.load(Ordering::Acquire) {
            drop(slot);
            registration.release();
        } else {
            *slot = Some(registration);
        }
    }

    /// Called by the acceptor once its listener is closed and workers joined.
    pub(crate) fn mark_stopped(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.stopped_cv.notify_all();
        debug!("acceptor stopped");
    }

    /// Waits up to `timeout` for the acceptor to stop. Returns `true` if it did.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .stopped_cv
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::{Events, Poll, Token};
    use std::sync::Arc;
    use std::thread;

    fn lifecycle_at(path: PathBuf) -> (Poll, Lifecycle) {
        let poll = Poll::new().unwrap();
        let waker = Waker::new(poll.registry(), Token(1)).unwrap();
        (poll, Lifecycle::new(waker, path))
    }

    #[test]
    fn shutdown_request_wakes_poll() {
        let dir = tempfile::tempdir().unwrap();
        let (mut poll, lifecycle) = lifecycle_at(dir.path().join("s.sock"));
        assert!(!lifecycle.is_shutdown_requested());

        lifecycle.request_shutdown();
        lifecycle.request_shutdown();
        assert!(lifecycle.is_shutdown_requested());

        let mut events = Events::with_capacity(4);
        poll.poll(&mut events, Some(Duration::from_secs(1))).unwrap();
        assert!(events.iter().any(|e| e.token() == Token(1)));
    }

    #[test]
    fn teardown_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        std::fs::write(&path, b"").unwrap();
        let (_poll, lifecycle) = lifecycle_at(path.clone());

        assert!(lifecycle.teardown());
        assert!(!path.exists());
        std::fs::write(&path, b"").unwrap();
        assert!(!lifecycle.teardown());
        assert!(path.exists(), "second teardown must not touch the path");
    }

    #[test]
    fn concurrent_teardown_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let (_poll, lifecycle) = lifecycle_at(dir.path().join("s.sock"));
        let lifecycle = Arc::new(lifecycle);
        let winners: usize = (0..8)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                thread::spawn(move || lifecycle.teardown())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn wait_stopped_times_out_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (_poll, lifecycle) = lifecycle_at(dir.path().join("s.sock"));
        assert!(!lifecycle.wait_stopped(Duration::from_millis(10)));
        lifecycle.mark_stopped();
        assert!(lifecycle.wait_stopped(Duration::from_millis(10)));
    }
}
