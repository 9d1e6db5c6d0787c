//! Accept loop for the control socket.
//!
//! The acceptor polls the listener together with the lifecycle's waker. Each
//! accepted connection gets its own worker thread. On shutdown the listener
//! is closed first, so later connection attempts are refused, then the read
//! half of every live connection is shut down and the workers are joined. A
//! worker that already received a full request still answers it.
//!
//! The listener is edge-triggered, so an accept that fails for lack of
//! descriptors or memory is retried on a timer instead of waiting for the
//! next connection to re-arm it.

use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};

use crate::gateway::Gateway;
use crate::net::ControlListener;
use crate::trace::{debug, error, info, warn};

use super::ConnId;
use super::lifecycle::Lifecycle;
use super::worker::Worker;

pub(crate) const LISTENER: Token = Token(0);
pub(crate) const WAKER: Token = Token(1);

const EVENTS_CAPACITY: usize = 16;

/// Bounds how long a worker may block writing to a peer that stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before retrying an accept that failed for lack of resources.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// How the accept loop reacts to a failed `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// The pending connection died before it was accepted; try the next one.
    Skip,
    /// The process is out of something; retry after [`ACCEPT_RETRY`].
    Retry,
}

impl AcceptFailure {
    fn classify(e: &io::Error) -> Self {
        let proto = rustix::io::Errno::PROTO.raw_os_error();
        match e.kind() {
            io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted => Self::Skip,
            _ if e.raw_os_error() == Some(proto) => Self::Skip,
            _ => Self::Retry,
        }
    }
}

struct ActiveConnection {
    conn: ConnId,
    /// Clone of the worker's stream, used to unblock it on shutdown.
    stream: UnixStream,
    thread: JoinHandle<()>,
}

pub(crate) struct Acceptor {
    poll: Poll,
    listener: ControlListener,
    gateway: Arc<Gateway>,
    lifecycle: Arc<Lifecycle>,
    connections: Vec<ActiveConnection>,
    next_conn: u64,
    /// Set while the backlog may hold connections a failed accept left behind.
    retry_accept: bool,
}

impl Acceptor {
    /// Registers `listener` with `poll`. The lifecycle's waker must already
    /// be registered on the same poll under [`WAKER`].
    pub(crate) fn new(
        poll: Poll,
        mut listener: ControlListener,
        gateway: Arc<Gateway>,
        lifecycle: Arc<Lifecycle>,
    ) -> io::Result<Self> {
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self {
            poll,
            listener,
            gateway,
            lifecycle,
            connections: Vec::new(),
            next_conn: 1,
            retry_accept: false,
        })
    }

    pub(crate) fn run(mut self) {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        info!(path = %self.listener.path().display(), "waiting for clients to connect");

        while !self.lifecycle.is_shutdown_requested() {
            let timeout = self.retry_accept.then_some(ACCEPT_RETRY);
            if let Err(e) = self.poll.poll(&mut events, timeout) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "poll failed, stopping");
                self.lifecycle.request_shutdown();
                break;
            }

            let mut listener_ready = false;
            for event in &events {
                match event.token() {
                    LISTENER => listener_ready = true,
                    WAKER => {
                        debug!("acceptor woken");
                    }
                    _ => {}
                }
            }
            if listener_ready || self.retry_accept {
                self.accept_pending();
            }
            self.reap_finished();
        }

        self.drain();
    }

    /// Accepts until the backlog is empty or an accept needs a retry.
    fn accept_pending(&mut self) {
        let retrying = std::mem::take(&mut self.retry_accept);
        loop {
            if self.lifecycle.is_shutdown_requested() {
                return;
            }
            match self.listener.try_accept() {
                Ok(Some(stream)) => {
                    if retrying {
                        info!("accepting connections again");
                    }
                    self.spawn_worker(stream);
                }
                Ok(None) => return,
                Err(e) => match AcceptFailure::classify(&e) {
                    AcceptFailure::Skip => {
                        debug!(error = %e, "pending connection failed before accept");
                    }
                    AcceptFailure::Retry => {
                        if !retrying {
                            error!(error = %e, retry_in = ?ACCEPT_RETRY, "failed to accept connection");
                        }
                        self.retry_accept = true;
                        return;
                    }
                },
            }
        }
    }

    fn spawn_worker(&mut self, stream: UnixStream) {
        let conn = ConnId(self.next_conn);
        self.next_conn += 1;

        if let Err(e) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
            warn!(conn = %conn, error = %e, "failed to set write timeout");
        }
        let shutdown_handle = match stream.try_clone() {
            Ok(handle) => handle,
            Err(e) => {
                error!(conn = %conn, error = %e, "failed to clone connection, dropping it");
                return;
            }
        };

        let worker = Worker::new(
            conn,
            stream,
            Arc::clone(&self.gateway),
            Arc::clone(&self.lifecycle),
        );
        let spawned = thread::Builder::new()
            .name(format!("wserver-conn-{conn}"))
            .spawn(move || {
                worker.run();
            });
        match spawned {
            Ok(thread) => self.connections.push(ActiveConnection {
                conn,
                stream: shutdown_handle,
                thread,
            }),
            Err(e) => {
                error!(conn = %conn, error = %e, "failed to spawn connection worker");
            }
        }
    }

    fn reap_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .connections
            .drain(..)
            .partition(|c| c.thread.is_finished());
        self.connections = running;
        for connection in finished {
            join(connection);
        }
    }

    fn drain(self) {
        let Self {
            poll,
            mut listener,
            connections,
            lifecycle,
            ..
        } = self;

        if let Err(e) = poll.registry().deregister(&mut listener) {
            debug!(error = %e, "failed to deregister listener");
        }
        drop(listener);
        info!(active = connections.len(), "listener closed, draining connections");

        for connection in &connections {
            // NotConnected just means the peer is already gone.
            let _ = connection.stream.shutdown(Shutdown::Read);
        }
        for connection in connections {
            join(connection);
        }

        lifecycle.teardown();
        lifecycle.mark_stopped();
    }
}

fn join(connection: ActiveConnection) {
    if connection.thread.join().is_err() {
        error!(conn = %connection.conn, "connection worker panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errno(e: rustix::io::Errno) -> io::Error {
        io::Error::from_raw_os_error(e.raw_os_error())
    }

    #[test]
    fn dead_pending_connections_are_skipped() {
        assert_eq!(
            AcceptFailure::classify(&errno(rustix::io::Errno::CONNABORTED)),
            AcceptFailure::Skip
        );
        assert_eq!(
            AcceptFailure::classify(&errno(rustix::io::Errno::PROTO)),
            AcceptFailure::Skip
        );
        assert_eq!(
            AcceptFailure::classify(&errno(rustix::io::Errno::INTR)),
            AcceptFailure::Skip
        );
    }

    #[test]
    fn resource_exhaustion_is_retried() {
        for e in [
            rustix::io::Errno::MFILE,
            rustix::io::Errno::NFILE,
            rustix::io::Errno::NOBUFS,
            rustix::io::Errno::NOMEM,
        ] {
            assert_eq!(AcceptFailure::classify(&errno(e)), AcceptFailure::Retry);
        }
    }
}
