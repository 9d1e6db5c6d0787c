//! Message types exchanged between control clients and the server.
//!
//! # Wire Format
//!
//! Every frame is a 1-byte kind tag followed by a payload whose size is fixed
//! by the tag. There is no length prefix and no variable-length data.
//!
//! ```text
//! ┌─────────┬──────────────────────────────────────────┐
//! │ Kind(1) │ Payload (fixed size per kind)            │
//! └─────────┴──────────────────────────────────────────┘
//! ```
//!
//! Response tags are the request tag with the high bit set. A response
//! payload is the request payload echoed verbatim, followed by a result byte
//! (and, for `Add`, the created station id).

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Message kind discriminants.
pub mod kind {
    pub const SHUTDOWN: u8 = 0x01;
    pub const UPDATE_SNR: u8 = 0x02;
    pub const DEL_BY_MAC: u8 = 0x03;
    pub const DEL_BY_ID: u8 = 0x04;
    pub const ADD: u8 = 0x05;

    /// Set on every response tag.
    pub const RESPONSE_BIT: u8 = 0x80;

    pub const UPDATE_SNR_RESPONSE: u8 = UPDATE_SNR | RESPONSE_BIT;
    pub const DEL_BY_MAC_RESPONSE: u8 = DEL_BY_MAC | RESPONSE_BIT;
    pub const DEL_BY_ID_RESPONSE: u8 = DEL_BY_ID | RESPONSE_BIT;
    pub const ADD_RESPONSE: u8 = ADD | RESPONSE_BIT;
}

/// Every message kind the protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Shutdown,
    UpdateSnr,
    DeleteByMac,
    DeleteById,
    Add,
    UpdateSnrResponse,
    DeleteByMacResponse,
    DeleteByIdResponse,
    AddResponse,
}

impl MessageKind {
    /// Maps a wire tag to a kind, `None` if the tag is not part of the protocol.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            kind::SHUTDOWN => Some(Self::Shutdown),
            kind::UPDATE_SNR => Some(Self::UpdateSnr),
            kind::DEL_BY_MAC => Some(Self::DeleteByMac),
            kind::DEL_BY_ID => Some(Self::DeleteById),
            kind::ADD => Some(Self::Add),
            kind::UPDATE_SNR_RESPONSE => Some(Self::UpdateSnrResponse),
            kind::DEL_BY_MAC_RESPONSE => Some(Self::DeleteByMacResponse),
            kind::DEL_BY_ID_RESPONSE => Some(Self::DeleteByIdResponse),
            kind::ADD_RESPONSE => Some(Self::AddResponse),
            _ => None,
        }
    }

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Shutdown => kind::SHUTDOWN,
            Self::UpdateSnr => kind::UPDATE_SNR,
            Self::DeleteByMac => kind::DEL_BY_MAC,
            Self::DeleteById => kind::DEL_BY_ID,
            Self::Add => kind::ADD,
            Self::UpdateSnrResponse => kind::UPDATE_SNR_RESPONSE,
            Self::DeleteByMacResponse => kind::DEL_BY_MAC_RESPONSE,
            Self::DeleteByIdResponse => kind::DEL_BY_ID_RESPONSE,
            Self::AddResponse => kind::ADD_RESPONSE,
        }
    }

    /// Size in bytes of the payload following the tag.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Shutdown => 0,
            Self::UpdateSnr => UPDATE_SNR_LEN,
            Self::DeleteByMac | Self::Add => MacAddr::LEN,
            Self::DeleteById => 1,
            Self::UpdateSnrResponse => UPDATE_SNR_LEN + 1,
            Self::DeleteByMacResponse => MacAddr::LEN + 1,
            Self::DeleteByIdResponse => 2,
            Self::AddResponse => MacAddr::LEN + 2,
        }
    }

    #[must_use]
    pub const fn is_response(self) -> bool {
        self.tag() & kind::RESPONSE_BIT != 0
    }
}

const UPDATE_SNR_LEN: usize = 2 * MacAddr::LEN + 4;

/// Size of the largest frame (tag included).
pub const MAX_FRAME_LEN: usize = 1 + UPDATE_SNR_LEN + 1;

/// A 6-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const LEN: usize = 6;

    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    #[must_use]
    pub const fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Error parsing a textual hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address {0:?}, expected six hex octets separated by ':'")]
pub struct ParseMacError(String);

impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_owned()))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseMacError(s.to_owned()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_owned()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_owned()));
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = ParseMacError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Station identifier assigned by the registry.
///
/// `0` never names a station; it is the id reported by a failed `Add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StationId(u8);

impl StationId {
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl From<u8> for StationId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome code carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateResult {
    Success = 0,
    NotFound = 1,
    Duplicate = 2,
}

impl UpdateResult {
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Success),
            1 => Some(Self::NotFound),
            2 => Some(Self::Duplicate),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::NotFound => "not found",
            Self::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}

/// Set the directional SNR of the link `from_addr → to_addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnrUpdateRequest {
    pub from_addr: MacAddr,
    pub to_addr: MacAddr,
    pub snr: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteByMacRequest {
    pub addr: MacAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteByIdRequest {
    pub id: StationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRequest {
    pub addr: MacAddr,
}

/// Requests a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Shutdown,
    UpdateSnr(SnrUpdateRequest),
    DeleteByMac(DeleteByMacRequest),
    DeleteById(DeleteByIdRequest),
    Add(AddRequest),
}

impl Request {
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Shutdown => MessageKind::Shutdown,
            Self::UpdateSnr(_) => MessageKind::UpdateSnr,
            Self::DeleteByMac(_) => MessageKind::DeleteByMac,
            Self::DeleteById(_) => MessageKind::DeleteById,
            Self::Add(_) => MessageKind::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnrUpdateResponse {
    pub request: SnrUpdateRequest,
    pub result: UpdateResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteByMacResponse {
    pub request: DeleteByMacRequest,
    pub result: UpdateResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteByIdResponse {
    pub request: DeleteByIdRequest,
    pub result: UpdateResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddResponse {
    pub request: AddRequest,
    pub result: UpdateResult,
    /// Id of the created station, [`StationId::NONE`] unless `result` is success.
    pub created_id: StationId,
}

/// Responses the server sends back, one per non-shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    UpdateSnr(SnrUpdateResponse),
    DeleteByMac(DeleteByMacResponse),
    DeleteById(DeleteByIdResponse),
    Add(AddResponse),
}

impl Response {
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::UpdateSnr(_) => MessageKind::UpdateSnrResponse,
            Self::DeleteByMac(_) => MessageKind::DeleteByMacResponse,
            Self::DeleteById(_) => MessageKind::DeleteByIdResponse,
            Self::Add(_) => MessageKind::AddResponse,
        }
    }

    #[must_use]
    pub const fn result(&self) -> UpdateResult {
        match self {
            Self::UpdateSnr(r) => r.result,
            Self::DeleteByMac(r) => r.result,
            Self::DeleteById(r) => r.result,
            Self::Add(r) => r.result,
        }
    }
}

/// A decoded frame of either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}
