//! Blocking client for the control socket.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{
    AddRequest, AddResponse, CodecError, DeleteByIdRequest, DeleteByIdResponse,
    DeleteByMacRequest, DeleteByMacResponse, MacAddr, MessageKind, Request, Response,
    SnrUpdateRequest, SnrUpdateResponse, StationId, read_response, write_request,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("server closed the connection")]
    Disconnected,

    #[error("expected {expected:?}, server answered {got:?}")]
    Mismatch {
        expected: MessageKind,
        got: MessageKind,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// One connection to a running server.
///
/// Each request method sends one frame and waits for its response.
pub struct Client {
    stream: UnixStream,
}

impl Client {
    /// Connects to the server listening at `path`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Io`] if the socket does not exist or refuses the
    /// connection.
    pub fn connect(path: impl AsRef<Path>) -> ClientResult<Self> {
        Ok(Self::from_stream(UnixStream::connect(path)?))
    }

    #[must_use]
    pub const fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Bounds how long a request waits for its response.
    ///
    /// # Errors
    ///
    /// Propagates the socket option error.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> ClientResult<()> {
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Sets the SNR of the link `from → to`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub fn update_snr(
        &mut self,
        from: MacAddr,
        to: MacAddr,
        snr: i32,
    ) -> ClientResult<SnrUpdateResponse> {
        let request = Request::UpdateSnr(SnrUpdateRequest {
            from_addr: from,
            to_addr: to,
            snr,
        });
        match self.round_trip(&request)? {
            Response::UpdateSnr(response) => Ok(response),
            other => Err(mismatch(MessageKind::UpdateSnrResponse, &other)),
        }
    }

    /// # Errors
    ///
    /// See [`ClientError`].
    pub fn delete_by_mac(&mut self, addr: MacAddr) -> ClientResult<DeleteByMacResponse> {
        let request = Request::DeleteByMac(DeleteByMacRequest { addr });
        match self.round_trip(&request)? {
            Response::DeleteByMac(response) => Ok(response),
            other => Err(mismatch(MessageKind::DeleteByMacResponse, &other)),
        }
    }

    /// # Errors
    ///
    /// See [`ClientError`].
    pub fn delete_by_id(&mut self, id: StationId) -> ClientResult<DeleteByIdResponse> {
        let request = Request::DeleteById(DeleteByIdRequest { id });
        match self.round_trip(&request)? {
            Response::DeleteById(response) => Ok(response),
            other => Err(mismatch(MessageKind::DeleteByIdResponse, &other)),
        }
    }

    /// Registers a station; the response carries its id.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub fn add_station(&mut self, addr: MacAddr) -> ClientResult<AddResponse> {
        let request = Request::Add(AddRequest { addr });
        match self.round_trip(&request)? {
            Response::Add(response) => Ok(response),
            other => Err(mismatch(MessageKind::AddResponse, &other)),
        }
    }

    /// Asks the server to stop. The server sends no response and closes the
    /// connection.
    ///
    /// # Errors
    ///
    /// [`ClientError::Io`] if the request cannot be written.
    pub fn shutdown(mut self) -> ClientResult<()> {
        write_request(&mut self.stream, &Request::Shutdown)?;
        Ok(())
    }

    fn round_trip(&mut self, request: &Request) -> ClientResult<Response> {
        write_request(&mut self.stream, request)?;
        read_response(&mut self.stream)?.ok_or(ClientError::Disconnected)
    }
}

fn mismatch(expected: MessageKind, got: &Response) -> ClientError {
    ClientError::Mismatch {
        expected,
        got: got.kind(),
    }
}
