//! The control server.
//!
//! [`Server::start`] binds the control socket, optionally installs a SIGINT
//! watcher, and runs the acceptor on its own thread. The returned
//! [`ServerHandle`] stops it, waits for it, and exposes the shared
//! [`Gateway`] so the simulation engine can read the state clients modify.
//!
//! Shutdown can be triggered three ways: SIGINT, a client's `Shutdown`
//! request, or [`ServerHandle::stop`]. All of them converge on the same
//! lifecycle object, which removes the socket path exactly once.

mod acceptor;
mod handlers;
mod interrupt;
mod lifecycle;
mod worker;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mio::{Poll, Waker};
use thiserror::Error;

use crate::config::ServerConfig;
use crate::gateway::Gateway;
use crate::medium::Medium;
use crate::net::ControlListener;
use crate::trace::{debug, error, info};

use acceptor::{Acceptor, WAKER};
use interrupt::InterruptWatcher;
use lifecycle::Lifecycle;

pub use handlers::Dispatch;
pub use worker::CloseReason;

/// Sequence number of an accepted connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create event loop: {0}")]
    Poll(#[source] io::Error),

    #[error("failed to bind control socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[source] io::Error),

    #[error("failed to spawn acceptor thread: {0}")]
    Spawn(#[source] io::Error),
}

pub struct Server;

impl Server {
    /// Starts serving `medium` on `config.socket_path`.
    ///
    /// # Errors
    ///
    /// See [`ServerError`]. Nothing is left running and the socket path is
    /// removed if startup fails after binding.
    pub fn start<M: Medium + 'static>(
        config: &ServerConfig,
        medium: M,
    ) -> Result<ServerHandle, ServerError> {
        Self::start_with_gateway(config, Arc::new(Gateway::new(medium)))
    }

    /// Like [`Server::start`] but serves an existing gateway.
    ///
    /// # Errors
    ///
    /// See [`ServerError`].
    pub fn start_with_gateway(
        config: &ServerConfig,
        gateway: Arc<Gateway>,
    ) -> Result<ServerHandle, ServerError> {
        let path = config.socket_path.clone();
        info!(path = %path.display(), "starting wserver");

        let poll = Poll::new().map_err(ServerError::Poll)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(ServerError::Poll)?;
        let lifecycle = Arc::new(Lifecycle::new(waker, path.clone()));

        let listener = ControlListener::bind(&path).map_err(|source| {
            error!(path = %path.display(), error = %source, "failed to bind control socket");
            ServerError::Bind {
                path: path.clone(),
                source,
            }
        })?;

        let acceptor = Acceptor::new(
            poll,
            listener,
            Arc::clone(&gateway),
            Arc::clone(&lifecycle),
        );
        let acceptor = match acceptor {
            Ok(acceptor) => acceptor,
            Err(e) => {
                lifecycle.teardown();
                return Err(ServerError::Poll(e));
            }
        };

        let interrupt = if config.handle_interrupt {
            match InterruptWatcher::install(
                Arc::clone(&lifecycle),
                config.drain_timeout(),
                config.exit_on_interrupt,
            ) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    drop(acceptor);
                    lifecycle.teardown();
                    return Err(ServerError::Signal(e));
                }
            }
        } else {
            None
        };

        let thread = thread::Builder::new()
            .name("wserver-acceptor".into())
            .spawn(move || acceptor.run());
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                drop(interrupt);
                lifecycle.teardown();
                return Err(ServerError::Spawn(e));
            }
        };

        Ok(ServerHandle {
            lifecycle,
            gateway,
            acceptor: Some(thread),
            interrupt,
        })
    }
}

/// Handle to a running server. Dropping it stops the server.
pub struct ServerHandle {
    lifecycle: Arc<Lifecycle>,
    gateway: Arc<Gateway>,
    acceptor: Option<JoinHandle<()>>,
    interrupt: Option<InterruptWatcher>,
}

impl ServerHandle {
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        self.lifecycle.socket_path()
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Whether the acceptor is still accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.acceptor.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the server and waits for in-flight connections to drain.
    ///
    /// Safe to call after the server already stopped on its own.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Blocks until the server stops through SIGINT or a client's `Shutdown`
    /// request, then tears down.
    pub fn wait(mut self) {
        self.join_acceptor();
        self.shutdown();
    }

    fn join_acceptor(&mut self) {
        if let Some(thread) = self.acceptor.take() {
            if thread.join().is_err() {
                error!("acceptor thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        self.lifecycle.request_shutdown();
        self.join_acceptor();
        if let Some(mut watcher) = self.interrupt.take() {
            watcher.close();
        }
        if self.lifecycle.teardown() {
            debug!("server torn down by handle");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
