//! Stream encoding and decoding of control frames.
//!
//! Reading is two-phase: [`read_header`] pulls the kind tag, then
//! [`read_payload`] pulls exactly the number of bytes that kind implies.
//! An orderly peer close before the tag is reported as `Ok(None)`, which
//! callers treat as a disconnect rather than an error.

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

use super::message::{
    AddRequest, AddResponse, DeleteByIdRequest, DeleteByIdResponse, DeleteByMacRequest,
    DeleteByMacResponse, MAX_FRAME_LEN, MacAddr, Message, MessageKind, Request, Response,
    SnrUpdateRequest, SnrUpdateResponse, StationId, UpdateResult,
};

/// Errors while decoding a frame from a stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The stream ended in the middle of a payload.
    #[error("truncated {kind:?} payload: need {need} bytes, have {have}")]
    Truncated {
        kind: MessageKind,
        need: usize,
        have: usize,
    },
    /// The tag is not part of the protocol.
    #[error("unknown message kind: 0x{0:02x}")]
    UnknownKind(u8),
    /// A known kind arrived in the wrong direction.
    #[error("unexpected message kind: {0:?}")]
    UnexpectedKind(MessageKind),
    /// A response carried a result byte outside the known codes.
    #[error("invalid result code: {0}")]
    InvalidResult(u8),
}

/// The fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    tag: u8,
}

impl Header {
    #[must_use]
    pub const fn tag(self) -> u8 {
        self.tag
    }

    #[must_use]
    pub const fn kind(self) -> Option<MessageKind> {
        MessageKind::from_tag(self.tag)
    }

    /// Number of payload bytes that follow, `None` for an unknown tag.
    #[must_use]
    pub const fn payload_len(self) -> Option<usize> {
        match self.kind() {
            Some(kind) => Some(kind.payload_len()),
            None => None,
        }
    }
}

/// Reads into `buf` until it is full or the stream ends; returns bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads the header of the next frame.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly.
pub fn read_header<R: Read>(r: &mut R) -> Result<Option<Header>, CodecError> {
    let mut tag = [0u8; 1];
    if read_full(r, &mut tag)? == 0 {
        return Ok(None);
    }
    Ok(Some(Header { tag: tag[0] }))
}

/// Reads and decodes the payload announced by `header`.
///
/// # Errors
///
/// - [`CodecError::UnknownKind`] if the header tag is not recognized
/// - [`CodecError::Truncated`] if the stream ends before the payload is complete
pub fn read_payload<R: Read>(r: &mut R, header: Header) -> Result<Message, CodecError> {
    let kind = header.kind().ok_or(CodecError::UnknownKind(header.tag))?;
    let need = kind.payload_len();
    let mut buf = [0u8; MAX_FRAME_LEN];
    let have = read_full(r, &mut buf[..need])?;
    if have < need {
        return Err(CodecError::Truncated { kind, need, have });
    }
    decode_payload(kind, &buf[..need])
}

/// Reads one client request. `Ok(None)` means the client disconnected.
pub fn read_request<R: Read>(r: &mut R) -> Result<Option<Request>, CodecError> {
    let Some(header) = read_header(r)? else {
        return Ok(None);
    };
    match read_payload(r, header)? {
        Message::Request(req) => Ok(Some(req)),
        Message::Response(resp) => Err(CodecError::UnexpectedKind(resp.kind())),
    }
}

/// Reads one server response. `Ok(None)` means the server closed the stream.
pub fn read_response<R: Read>(r: &mut R) -> Result<Option<Response>, CodecError> {
    let Some(header) = read_header(r)? else {
        return Ok(None);
    };
    match read_payload(r, header)? {
        Message::Response(resp) => Ok(Some(resp)),
        Message::Request(req) => Err(CodecError::UnexpectedKind(req.kind())),
    }
}

/// Writes a request as a single frame.
pub fn write_request<W: Write>(w: &mut W, request: &Request) -> io::Result<()> {
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    encode_request(request, &mut buf);
    w.write_all(&buf)?;
    w.flush()
}

/// Writes a response as a single frame.
pub fn write_response<W: Write>(w: &mut W, response: &Response) -> io::Result<()> {
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    encode_response(response, &mut buf);
    w.write_all(&buf)?;
    w.flush()
}

/// Encodes a request frame into `buf`, which is cleared first.
pub fn encode_request(request: &Request, buf: &mut Vec<u8>) {
    let mut w = FrameWriter::new(buf, request.kind());
    match request {
        Request::Shutdown => {}
        Request::UpdateSnr(req) => w.put_update(req),
        Request::DeleteByMac(req) => w.put_mac(req.addr),
        Request::DeleteById(req) => w.put_u8(req.id.as_u8()),
        Request::Add(req) => w.put_mac(req.addr),
    }
}

/// Encodes a response frame into `buf`, which is cleared first.
pub fn encode_response(response: &Response, buf: &mut Vec<u8>) {
    let mut w = FrameWriter::new(buf, response.kind());
    match response {
        Response::UpdateSnr(resp) => {
            w.put_update(&resp.request);
            w.put_u8(resp.result as u8);
        }
        Response::DeleteByMac(resp) => {
            w.put_mac(resp.request.addr);
            w.put_u8(resp.result as u8);
        }
        Response::DeleteById(resp) => {
            w.put_u8(resp.request.id.as_u8());
            w.put_u8(resp.result as u8);
        }
        Response::Add(resp) => {
            w.put_mac(resp.request.addr);
            w.put_u8(resp.result as u8);
            w.put_u8(resp.created_id.as_u8());
        }
    }
}

fn decode_payload(kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError> {
    let mut r = FrameReader::new(kind, bytes);

    let msg = match kind {
        MessageKind::Shutdown => Message::Request(Request::Shutdown),
        MessageKind::UpdateSnr => Message::Request(Request::UpdateSnr(r.take_update()?)),
        MessageKind::DeleteByMac => Message::Request(Request::DeleteByMac(DeleteByMacRequest {
            addr: r.take_mac()?,
        })),
        MessageKind::DeleteById => Message::Request(Request::DeleteById(DeleteByIdRequest {
            id: StationId::from(r.take_u8()?),
        })),
        MessageKind::Add => Message::Request(Request::Add(AddRequest {
            addr: r.take_mac()?,
        })),
        MessageKind::UpdateSnrResponse => {
            let request = r.take_update()?;
            let result = r.take_result()?;
            Message::Response(Response::UpdateSnr(SnrUpdateResponse { request, result }))
        }
        MessageKind::DeleteByMacResponse => {
            let request = DeleteByMacRequest {
                addr: r.take_mac()?,
            };
            let result = r.take_result()?;
            Message::Response(Response::DeleteByMac(DeleteByMacResponse { request, result }))
        }
        MessageKind::DeleteByIdResponse => {
            let request = DeleteByIdRequest {
                id: StationId::from(r.take_u8()?),
            };
            let result = r.take_result()?;
            Message::Response(Response::DeleteById(DeleteByIdResponse { request, result }))
        }
        MessageKind::AddResponse => {
            let request = AddRequest {
                addr: r.take_mac()?,
            };
            let result = r.take_result()?;
            let created_id = StationId::from(r.take_u8()?);
            Message::Response(Response::Add(AddResponse {
                request,
                result,
                created_id,
            }))
        }
    };

    Ok(msg)
}

/// Writer for encoding frames.
struct FrameWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> FrameWriter<'a> {
    fn new(buf: &'a mut Vec<u8>, kind: MessageKind) -> Self {
        buf.clear();
        buf.push(kind.tag());
        Self { buf }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_mac(&mut self, mac: MacAddr) {
        self.buf.extend_from_slice(&mac.octets());
    }

    fn put_update(&mut self, req: &SnrUpdateRequest) {
        self.put_mac(req.from_addr);
        self.put_mac(req.to_addr);
        self.put_i32(req.snr);
    }
}

/// Reader for decoding a payload that is already fully buffered.
struct FrameReader<'a> {
    kind: MessageKind,
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> FrameReader<'a> {
    const fn new(kind: MessageKind, buf: &'a [u8]) -> Self {
        Self {
            kind,
            buf,
            cursor: 0,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let remaining = self.buf.len() - self.cursor;
        if remaining < N {
            return Err(CodecError::Truncated {
                kind: self.kind,
                need: N,
                have: remaining,
            });
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + N]);
        self.cursor += N;
        Ok(arr)
    }

    fn take_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    fn take_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    fn take_mac(&mut self) -> Result<MacAddr, CodecError> {
        Ok(MacAddr::new(self.take::<6>()?))
    }

    fn take_result(&mut self) -> Result<UpdateResult, CodecError> {
        let v = self.take_u8()?;
        UpdateResult::from_u8(v).ok_or(CodecError::InvalidResult(v))
    }

    fn take_update(&mut self) -> Result<SnrUpdateRequest, CodecError> {
        Ok(SnrUpdateRequest {
            from_addr: self.take_mac()?,
            to_addr: self.take_mac()?,
            snr: self.take_i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const A: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x01]);
    const B: MacAddr = MacAddr::new([0x02, 0, 0, 0, 0, 0x02]);

    fn encoded_request(req: &Request) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_request(req, &mut buf);
        buf
    }

    #[test]
    fn update_request_layout() {
        let buf = encoded_request(&Request::UpdateSnr(SnrUpdateRequest {
            from_addr: A,
            to_addr: B,
            snr: -5,
        }));
        assert_eq!(buf.len(), 17);
        assert_eq!(buf[0], 0x02);
        assert_eq!(&buf[1..7], &A.octets());
        assert_eq!(&buf[7..13], &B.octets());
        assert_eq!(&buf[13..17], &(-5i32).to_le_bytes());
    }

    #[test]
    fn shutdown_is_a_bare_tag() {
        assert_eq!(encoded_request(&Request::Shutdown), vec![0x01]);
    }

    #[test]
    fn request_decodes_from_stream() {
        let req = Request::Add(AddRequest { addr: A });
        let mut cursor = Cursor::new(encoded_request(&req));
        assert_eq!(read_request(&mut cursor).unwrap(), Some(req));
        // Stream exhausted: next read is a clean disconnect.
        assert_eq!(read_request(&mut cursor).unwrap(), None);
    }

    #[test]
    fn empty_stream_is_disconnect() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_header(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn header_reports_payload_len() {
        let mut cursor = Cursor::new(vec![0x02]);
        let header = read_header(&mut cursor).unwrap().unwrap();
        assert_eq!(header.kind(), Some(MessageKind::UpdateSnr));
        assert_eq!(header.payload_len(), Some(16));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let mut cursor = Cursor::new(vec![0x7f, 0, 0]);
        let result = read_request(&mut cursor);
        assert!(matches!(result, Err(CodecError::UnknownKind(0x7f))));
    }

    #[test]
    fn short_payload_is_truncated_error() {
        let mut bytes = encoded_request(&Request::UpdateSnr(SnrUpdateRequest {
            from_addr: A,
            to_addr: B,
            snr: 1,
        }));
        bytes.truncate(9);
        let mut cursor = Cursor::new(bytes);
        let result = read_request(&mut cursor);
        assert!(matches!(
            result,
            Err(CodecError::Truncated {
                kind: MessageKind::UpdateSnr,
                need: 16,
                have: 8
            })
        ));
    }

    #[test]
    fn response_rejected_as_request() {
        let mut buf = Vec::new();
        encode_response(
            &Response::DeleteById(DeleteByIdResponse {
                request: DeleteByIdRequest {
                    id: StationId::new(3),
                },
                result: UpdateResult::Success,
            }),
            &mut buf,
        );
        let result = read_request(&mut Cursor::new(buf));
        assert!(matches!(
            result,
            Err(CodecError::UnexpectedKind(MessageKind::DeleteByIdResponse))
        ));
    }

    #[test]
    fn add_response_carries_id_after_result() {
        let resp = Response::Add(AddResponse {
            request: AddRequest { addr: B },
            result: UpdateResult::Success,
            created_id: StationId::new(9),
        });
        let mut buf = Vec::new();
        encode_response(&resp, &mut buf);
        assert_eq!(buf[0], 0x85);
        assert_eq!(&buf[1..7], &B.octets());
        assert_eq!(buf[7], 0);
        assert_eq!(buf[8], 9);
        assert_eq!(read_response(&mut Cursor::new(buf)).unwrap(), Some(resp));
    }

    #[test]
    fn invalid_result_code_rejected() {
        let mut cursor = Cursor::new(vec![0x84, 0x01, 0x07]);
        let result = read_response(&mut cursor);
        assert!(matches!(result, Err(CodecError::InvalidResult(7))));
    }

    #[test]
    fn write_request_emits_one_frame() {
        let mut out = Vec::new();
        write_request(
            &mut out,
            &Request::DeleteByMac(DeleteByMacRequest { addr: A }),
        )
        .unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out[0], 0x03);
    }
}
