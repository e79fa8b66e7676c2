//! Length-prefixed wire frames.
//!
//! ```text
//! ┌───────────────┬───────────────┬───────────────────┐
//! │ Start id (8B) │ Length (8B)   │ Payload           │
//! │ u64 LE        │ u64 LE        │ (Length bytes)    │
//! └───────────────┴───────────────┴───────────────────┘
//! ```
use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ReceivedFrame, TransportError};

/// Frame header: start id (8) + length (8) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Upper bound for growing the buffer ahead of a partially received frame.
const MAX_RESERVE: usize = 64 * 1024;

/// Encode `payload` into a frame ready to be written to the socket.
pub fn encode_frame(start_id: u64, payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    dst.put_u64_le(start_id);
    dst.put_u64_le(payload.len() as u64);
    dst.put_slice(payload);
    dst.freeze()
}

/// Decode a frame from the front of `src`.
///
/// Returns `Ok(None)` if `src` doesn't hold a complete frame yet. On success the frame
/// bytes are consumed from `src`.
pub fn decode_frame(
    src: &mut BytesMut,
    max_len: usize,
) -> Result<Option<ReceivedFrame>, TransportError> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    let mut header = &src[..HEADER_SIZE];
    let start_id = header.get_u64_le();
    let len = header.get_u64_le();
    let payload_len = match usize::try_from(len) {
        Ok(payload_len) if payload_len <= max_len => payload_len,
        _ => return Err(TransportError::FrameTooLarge { len, max: max_len }),
    };
    if src.len() < HEADER_SIZE + payload_len {
        // announced lengths are untrusted, grow with the data instead
        src.reserve((HEADER_SIZE + payload_len - src.len()).min(MAX_RESERVE));
        return Ok(None);
    }
    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(ReceivedFrame { start_id, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = encode_frame(0x0102, b"abc");
        assert_eq!(HEADER_SIZE + 3, frame.len());
        assert_eq!([0x02, 0x01, 0, 0, 0, 0, 0, 0], frame[..8]);
        assert_eq!([3, 0, 0, 0, 0, 0, 0, 0], frame[8..16]);
        assert_eq!(b"abc", &frame[16..]);
    }

    #[test]
    fn test_partial_frame_reserve_is_bounded() {
        let mut buf = BytesMut::new();
        buf.put_u64_le(0);
        buf.put_u64_le(512 << 20);
        assert!(decode_frame(&mut buf, 1 << 30).unwrap().is_none());
        assert!(buf.capacity() < 1 << 20);
        assert_eq!(HEADER_SIZE, buf.len());
    }

    #[test]
    fn test_decode_partial() {
        let frame = encode_frame(7, b"hello");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame[..10]);
        assert!(decode_frame(&mut buf, 1024).unwrap().is_none());
        buf.extend_from_slice(&frame[10..19]);
        assert!(decode_frame(&mut buf, 1024).unwrap().is_none());
        assert_eq!(19, buf.len());
        buf.extend_from_slice(&frame[19..]);
        let decoded = decode_frame(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(7, decoded.start_id);
        assert_eq!(&b"hello"[..], decoded.payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(0, b"first"));
        buf.extend_from_slice(&encode_frame(0, b""));
        buf.extend_from_slice(&encode_frame(1, b"third"));
        let payloads: Vec<Bytes> = std::iter::from_fn(|| decode_frame(&mut buf, 1024).unwrap())
            .map(|f| f.payload)
            .collect();
        assert_eq!(
            vec![
                Bytes::from_static(b"first"),
                Bytes::new(),
                Bytes::from_static(b"third")
            ],
            payloads
        );
    }

    #[test]
    fn test_decode_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u64_le(0);
        buf.put_u64_le(2048);
        assert!(matches!(
            decode_frame(&mut buf, 1024),
            Err(TransportError::FrameTooLarge {
                len: 2048,
                max: 1024
            })
        ));
    }
}
