//! SIGINT handling.
//!
//! signal-hook keeps its process-wide handler installed after a watcher is
//! closed, which would swallow every later SIGINT. A conditional default
//! action is registered next to the watchers and armed whenever none is
//! active, so the process terminates on SIGINT again once the last server
//! has torn down.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use signal_hook::consts::SIGINT;
use signal_hook::iterator::{Handle, Signals};

use crate::trace::{debug, error, info, warn};

use super::lifecycle::Lifecycle;

/// The default-action fallback shared by all watchers in the process.
struct DefaultAction {
    armed: Arc<AtomicBool>,
    watchers: usize,
}

static DEFAULT_ACTION: Mutex<Option<DefaultAction>> = Mutex::new(None);

/// Disarms the default action for one more active watcher.
fn claim_default_action() -> io::Result<()> {
    let mut slot = DEFAULT_ACTION.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.as_mut() {
        Some(action) => {
            action.watchers += 1;
            action.armed.store(false, Ordering::SeqCst);
        }
        None => {
            let armed = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register_conditional_default(SIGINT, Arc::clone(&armed))?;
            *slot = Some(DefaultAction { armed, watchers: 1 });
        }
    }
    Ok(())
}

/// Re-arms the default action when the last active watcher is released.
fn release_default_action() {
    let mut slot = DEFAULT_ACTION.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(action) = slot.as_mut() {
        action.watchers = action.watchers.saturating_sub(1);
        if action.watchers == 0 {
            action.armed.store(true, Ordering::SeqCst);
            debug!("default SIGINT action restored");
        }
    }
}

/// Stops SIGINT delivery to a watcher. Held by the [`Lifecycle`] so that
/// every shutdown path releases it during teardown.
pub(crate) struct InterruptRegistration {
    handle: Handle,
}

impl InterruptRegistration {
    pub(crate) fn release(self) {
        self.handle.close();
        release_default_action();
    }
}

/// Thread that turns SIGINT into a server shutdown.
///
/// On interrupt it requests shutdown, waits up to `drain_timeout` for the
/// acceptor to stop, tears down, and exits the process with status 0 if
/// `exit_process` is set.
pub(crate) struct InterruptWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    pub(crate) fn install(
        lifecycle: Arc<Lifecycle>,
        drain_timeout: Duration,
        exit_process: bool,
    ) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT])?;
        let handle = signals.handle();
        if let Err(e) = claim_default_action() {
            handle.close();
            return Err(e);
        }

        let watched = Arc::clone(&lifecycle);
        let thread = thread::Builder::new()
            .name("wserver-sigint".into())
            .spawn(move || {
                // `None` once the handle is closed.
                if signals.forever().next().is_none() {
                    return;
                }
                info!("interrupt received");
                watched.request_shutdown();
                if !watched.wait_stopped(drain_timeout) {
                    warn!(timeout = ?drain_timeout, "connections did not drain in time");
                }
                watched.teardown();
                if exit_process {
                    std::process::exit(0);
                }
            });
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                InterruptRegistration { handle }.release();
                return Err(e);
            }
        };

        lifecycle.attach_interrupt(InterruptRegistration {
            handle: handle.clone(),
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stops watching and joins the watcher thread. Returns `false` if the
    /// thread panicked.
    pub(crate) fn close(&mut self) -> bool {
        self.handle.close();
        let Some(thread) = self.thread.take() else {
            return true;
        };
        if thread.join().is_err() {
            error!("interrupt watcher thread panicked");
            return false;
        }
        true
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.close();
    }
}
