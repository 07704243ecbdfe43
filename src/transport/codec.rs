//! Envelope frame codec
//!
//! ```text
//! +-------------+---------+----------+------------------+---------+-------+
//! | BodyLen(4)  | Kind(1) | Flags(1) | [PayloadLen(4)]  | Payload | [ROI] |
//! +-------------+---------+----------+------------------+---------+-------+
//! ```
//!
//! All integers are big-endian. `PayloadLen` is only present when flag bit 0
//! (ROI) is set; the ROI payload then takes the rest of the body. Identities
//! are never encoded: the receiving endpoint assigns them per connection.

use bytes::{Buf, BufMut, BytesMut};

use crate::envelope::{Envelope, Kind};

use super::error::CodecError;

/// Maximum frame body size (64 MiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

const LEN_SIZE: usize = 4;
const HEADER_SIZE: usize = 2;
const FLAG_ROI: u8 = 0x01;

/// Body length of the frame for an envelope, if it fits
pub fn frame_body_len(envelope: &Envelope) -> Result<usize, CodecError> {
    let body_len = HEADER_SIZE
        + envelope.payload().len()
        + envelope.roi().map_or(0, |r| LEN_SIZE + r.len());

    if body_len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(body_len));
    }
    Ok(body_len)
}

/// Append one encoded frame to `dst`
///
/// Envelopes the receiving side would reject are refused and nothing is
/// written.
pub fn encode(envelope: &Envelope, dst: &mut BytesMut) -> Result<(), CodecError> {
    let body_len = frame_body_len(envelope)?;
    let payload = envelope.payload();
    let roi = envelope.roi();

    dst.reserve(LEN_SIZE + body_len);
    dst.put_u32(body_len as u32);
    dst.put_u8(envelope.kind().code());

    match roi {
        Some(roi) => {
            dst.put_u8(FLAG_ROI);
            dst.put_u32(payload.len() as u32);
            dst.extend_from_slice(payload);
            dst.extend_from_slice(roi);
        }
        None => {
            dst.put_u8(0);
            dst.extend_from_slice(payload);
        }
    }
    Ok(())
}

/// Take one complete frame off the front of `src`
///
/// Returns `Ok(None)` if more bytes are needed.
pub fn decode(src: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    if src.len() < LEN_SIZE {
        return Ok(None);
    }

    let body_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(body_len));
    }
    if body_len < HEADER_SIZE {
        return Err(CodecError::Malformed);
    }
    if src.len() < LEN_SIZE + body_len {
        src.reserve(LEN_SIZE + body_len - src.len());
        return Ok(None);
    }

    src.advance(LEN_SIZE);
    let mut body = src.split_to(body_len).freeze();

    let code = body.get_u8();
    let kind = Kind::from_code(code).ok_or(CodecError::UnknownKind(code))?;
    let flags = body.get_u8();

    if flags & FLAG_ROI == 0 {
        return Ok(Some(Envelope::new(kind, body)));
    }

    if body.remaining() < LEN_SIZE {
        return Err(CodecError::Malformed);
    }
    let payload_len = body.get_u32() as usize;
    if payload_len > body.remaining() {
        return Err(CodecError::Malformed);
    }
    let payload = body.split_to(payload_len);

    Ok(Some(Envelope::new(kind, payload).with_roi(body)))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut encoded = BytesMut::new();
        encode(&Envelope::event(Bytes::from_static(b"event-1")), &mut encoded).unwrap();

        let mut src = BytesMut::new();
        src.extend_from_slice(&encoded[..5]);
        assert_eq!(decode(&mut src).unwrap(), None);

        src.extend_from_slice(&encoded[5..]);
        let env = decode(&mut src).unwrap().unwrap();
        assert!(env.is_kind(Kind::Event));
        assert_eq!(env.payload(), &Bytes::from_static(b"event-1"));
        assert!(src.is_empty());
    }

    #[test]
    fn test_back_to_back_frames_with_roi() {
        let first = Envelope::raw_data(Bytes::from_static(b"data")).with_roi(Bytes::from_static(b"roi"));
        let second = Envelope::signal(Kind::Terminate);

        let mut src = BytesMut::new();
        encode(&first, &mut src).unwrap();
        encode(&second, &mut src).unwrap();

        assert_eq!(decode(&mut src).unwrap(), Some(first));
        assert_eq!(decode(&mut src).unwrap(), Some(second));
        assert_eq!(decode(&mut src).unwrap(), None);
    }

    #[test]
    fn test_identity_is_not_encoded() {
        let env = Envelope::event(Bytes::from_static(b"x"))
            .with_identity(crate::envelope::Identity::from("worker-7"));

        let mut src = BytesMut::new();
        encode(&env, &mut src).unwrap();
        let decoded = decode(&mut src).unwrap().unwrap();

        assert!(!decoded.has_identity());
        assert!(decoded.same_event(&env));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut src = BytesMut::new();
        src.put_u32(2);
        src.put_u8(42);
        src.put_u8(0);
        assert_eq!(decode(&mut src), Err(CodecError::UnknownKind(42)));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut src = BytesMut::new();
        src.put_u32((MAX_FRAME_SIZE + 1) as u32);
        assert_eq!(
            decode(&mut src),
            Err(CodecError::FrameTooLarge(MAX_FRAME_SIZE + 1))
        );
    }

    #[test]
    fn test_encode_refuses_oversized_envelope() {
        let env = Envelope::raw_data(vec![0u8; MAX_FRAME_SIZE]);
        let mut dst = BytesMut::new();

        assert_eq!(
            encode(&env, &mut dst),
            Err(CodecError::FrameTooLarge(MAX_FRAME_SIZE + 2))
        );
        assert!(dst.is_empty());

        let fits = Envelope::raw_data(vec![0u8; MAX_FRAME_SIZE - 2]);
        assert_eq!(frame_body_len(&fits), Ok(MAX_FRAME_SIZE));
    }

    #[test]
    fn test_rejects_roi_length_past_body() {
        let mut src = BytesMut::new();
        src.put_u32(2 + 4 + 1);
        src.put_u8(Kind::RawData.code());
        src.put_u8(FLAG_ROI);
        src.put_u32(100);
        src.put_u8(0);
        assert_eq!(decode(&mut src), Err(CodecError::Malformed));
    }
}
