//! Request handlers.
//!
//! Each handler applies one request to the [`Gateway`] and writes the matching
//! response. The medium lock is released before the response is written.

use std::io::Write;

use crate::gateway::Gateway;
use crate::medium::MediumError;
use crate::protocol::{
    AddRequest, AddResponse, DeleteByIdRequest, DeleteByIdResponse, DeleteByMacRequest,
    DeleteByMacResponse, Request, Response, SnrUpdateRequest, SnrUpdateResponse, StationId,
    UpdateResult, write_response,
};
use crate::trace::{debug, error, info, warn};

use super::ConnId;

/// What the connection should do after a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Wait for the next request.
    Continue,
    /// Close this connection only.
    Error,
    /// Close this connection and stop the server.
    Close,
}

/// Handles requests for one connection.
pub(crate) struct Handler<'a> {
    gateway: &'a Gateway,
    conn: ConnId,
}

impl<'a> Handler<'a> {
    pub(crate) const fn new(gateway: &'a Gateway, conn: ConnId) -> Self {
        Self { gateway, conn }
    }

    pub(crate) fn handle<W: Write>(&self, out: &mut W, request: Request) -> Dispatch {
        match request {
            Request::Shutdown => {
                info!(conn = %self.conn, "client requested shutdown");
                Dispatch::Close
            }
            Request::UpdateSnr(req) => self.update_snr(out, req),
            Request::DeleteByMac(req) => self.delete_by_mac(out, req),
            Request::DeleteById(req) => self.delete_by_id(out, req),
            Request::Add(req) => self.add(out, req),
        }
    }

    fn update_snr<W: Write>(&self, out: &mut W, request: SnrUpdateRequest) -> Dispatch {
        let result = self
            .gateway
            .update_snr(request.from_addr, request.to_addr, request.snr);
        if result == UpdateResult::Success {
            info!(
                conn = %self.conn,
                from = %request.from_addr,
                to = %request.to_addr,
                snr = request.snr,
                "updated link SNR"
            );
        } else {
            debug!(
                conn = %self.conn,
                from = %request.from_addr,
                to = %request.to_addr,
                "SNR update for unknown station"
            );
        }
        self.send(out, &Response::UpdateSnr(SnrUpdateResponse { request, result }))
    }

    fn delete_by_mac<W: Write>(&self, out: &mut W, request: DeleteByMacRequest) -> Dispatch {
        let result = self.gateway.delete_station_by_mac(request.addr);
        match result {
            UpdateResult::Success => {
                info!(conn = %self.conn, addr = %request.addr, "removed station");
            }
            _ => {
                debug!(conn = %self.conn, addr = %request.addr, "no station to remove");
            }
        }
        self.send(out, &Response::DeleteByMac(DeleteByMacResponse { request, result }))
    }

    fn delete_by_id<W: Write>(&self, out: &mut W, request: DeleteByIdRequest) -> Dispatch {
        let result = self.gateway.delete_station_by_id(request.id);
        match result {
            UpdateResult::Success => {
                info!(conn = %self.conn, id = %request.id, "removed station");
            }
            _ => {
                debug!(conn = %self.conn, id = %request.id, "no station to remove");
            }
        }
        self.send(out, &Response::DeleteById(DeleteByIdResponse { request, result }))
    }

    fn add<W: Write>(&self, out: &mut W, request: AddRequest) -> Dispatch {
        let (result, created_id) = match self.gateway.add_station(request.addr) {
            Ok(id) => {
                info!(conn = %self.conn, addr = %request.addr, id = %id, "added station");
                (UpdateResult::Success, id)
            }
            Err(MediumError::Duplicate(_)) => {
                warn!(conn = %self.conn, addr = %request.addr, "station already registered");
                (UpdateResult::Duplicate, StationId::NONE)
            }
            Err(e @ MediumError::IdsExhausted) => {
                error!(conn = %self.conn, addr = %request.addr, error = %e, "cannot add station");
                return Dispatch::Error;
            }
        };
        self.send(
            out,
            &Response::Add(AddResponse {
                request,
                result,
                created_id,
            }),
        )
    }

    fn send<W: Write>(&self, out: &mut W, response: &Response) -> Dispatch {
        match write_response(out, response) {
            Ok(()) => Dispatch::Continue,
            Err(e) => {
                error!(conn = %self.conn, kind = ?response.kind(), error = %e, "failed to send response");
                Dispatch::Error
            }
        }
    }
}
