//! Control protocol: message types and their stream codec.

pub mod codec;
pub mod message;

pub use codec::{
    CodecError, Header, read_header, read_payload, read_request, read_response, write_request,
    write_response,
};
pub use message::{
    AddRequest, AddResponse, DeleteByIdRequest, DeleteByIdResponse, DeleteByMacRequest,
    DeleteByMacResponse, MacAddr, Message, MessageKind, Request, Response, SnrUpdateRequest,
    SnrUpdateResponse, StationId, UpdateResult,
};
