//! Listening Unix socket for mio-based accept loops.
//!
//! Wraps a non-blocking [`std::os::unix::net::UnixListener`] and registers it
//! with mio through its file descriptor. Accepted streams are handed out in
//! blocking mode, ready for a dedicated worker thread.

use std::fs;
use std::io::{self, ErrorKind};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};

/// A non-blocking listening socket bound to a filesystem path.
pub struct ControlListener {
    inner: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Binds a listener at `path`, replacing a stale socket file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file at `path` cannot be removed, or if
    /// binding fails (e.g., permission denied, missing parent directory).
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        remove_stale(&path)?;
        let inner = UnixListener::bind(&path)?;
        inner.set_nonblocking(true)?;
        Ok(Self { inner, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` instead of `WouldBlock` when the backlog is empty.
    pub fn try_accept(&self) -> io::Result<Option<UnixStream>> {
        match self.inner.accept() {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false)?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Removes the socket file at `path`; a missing file is not an error.
pub fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Process id of the peer of a connected stream, if the kernel reports one.
#[must_use]
pub fn peer_pid(stream: &UnixStream) -> Option<i32> {
    rustix::net::sockopt::socket_peercred(stream.as_fd())
        .ok()
        .map(|cred| cred.pid.as_raw_nonzero().get())
}

impl AsFd for ControlListener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl Source for ControlListener {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        SourceFd(&self.inner.as_raw_fd()).deregister(registry)
    }
}
