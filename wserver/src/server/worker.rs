//! Per-connection request loop.

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use crate::gateway::Gateway;
use crate::net::peer_pid;
use crate::protocol::{CodecError, Request, read_request};
use crate::trace::{debug, info, trace, warn};

use super::ConnId;
use super::handlers::{Dispatch, Handler};
use super::lifecycle::Lifecycle;

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end between requests.
    Disconnected,
    /// A malformed frame or a failed handler or write.
    Error,
    /// The peer asked the server to stop.
    Shutdown,
}

enum State {
    AwaitRequest,
    Dispatching(Request),
    Closing(CloseReason),
}

/// Serves requests on one accepted connection until it closes.
pub(crate) struct Worker {
    conn: ConnId,
    stream: UnixStream,
    gateway: Arc<Gateway>,
    lifecycle: Arc<Lifecycle>,
}

impl Worker {
    pub(crate) fn new(
        conn: ConnId,
        stream: UnixStream,
        gateway: Arc<Gateway>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            conn,
            stream,
            gateway,
            lifecycle,
        }
    }

    pub(crate) fn run(mut self) -> CloseReason {
        info!(conn = %self.conn, peer_pid = ?peer_pid(&self.stream), "client connected");

        let mut state = State::AwaitRequest;
        loop {
            state = match state {
                State::AwaitRequest => self.await_request(),
                State::Dispatching(request) => self.dispatch(request),
                State::Closing(reason) => {
                    self.close(reason);
                    return reason;
                }
            };
        }
    }

    fn await_request(&mut self) -> State {
        trace!(conn = %self.conn, "waiting for request");
        match read_request(&mut self.stream) {
            Ok(Some(request)) => State::Dispatching(request),
            Ok(None) => State::Closing(CloseReason::Disconnected),
            Err(CodecError::Io(e)) => {
                debug!(conn = %self.conn, error = %e, "connection read failed");
                State::Closing(CloseReason::Error)
            }
            Err(e) => {
                warn!(conn = %self.conn, error = %e, "malformed request");
                State::Closing(CloseReason::Error)
            }
        }
    }

    fn dispatch(&mut self, request: Request) -> State {
        debug!(conn = %self.conn, kind = ?request.kind(), "dispatching request");
        match Handler::new(&self.gateway, self.conn).handle(&mut self.stream, request) {
            Dispatch::Continue => State::AwaitRequest,
            Dispatch::Error => State::Closing(CloseReason::Error),
            Dispatch::Close => {
                self.lifecycle.request_shutdown();
                State::Closing(CloseReason::Shutdown)
            }
        }
    }

    fn close(&self, reason: CloseReason) {
        match reason {
            CloseReason::Disconnected => {
                info!(conn = %self.conn, "client disconnected");
            }
            CloseReason::Error => {
                warn!(conn = %self.conn, "closing connection after error");
            }
            CloseReason::Shutdown => {
                info!(conn = %self.conn, "closing connection for shutdown");
            }
        }
    }
}
