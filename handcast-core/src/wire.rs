//! Framing: length prefix (8 bytes, big-endian u64) + bincode payload.

use crate::protocol::{Frame, MAX_HANDS};

/// Size of the length prefix on the wire.
pub const LEN_SIZE: usize = 8;

/// Ceiling on a single payload. Anything larger is treated as corruption.
pub const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024; // 16 MiB

/// Encode a frame into a single message: 8-byte BE length + bincode payload.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let payload = bincode::serialize(frame).map_err(EncodeError::Encode)?;
    let len = payload.len() as u64;
    if len > MAX_FRAME_LEN {
        return Err(EncodeError::TooLarge);
    }
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Error encoding a frame (bincode or size ceiling).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame too large")]
    TooLarge,
}

/// Decode one payload (the bytes after the length prefix) into a frame.
/// There is no resynchronization point in a corrupted length-prefixed
/// stream, so callers tear the connection down on this error.
pub fn decode_payload(payload: &[u8]) -> Result<Frame, MalformedFrame> {
    let frame: Frame = bincode::deserialize(payload).map_err(MalformedFrame::Decode)?;
    if frame.hands().len() > MAX_HANDS {
        return Err(MalformedFrame::TooManyHands(frame.hands().len()));
    }
    Ok(frame)
}

/// Payload failed to decode into a frame.
#[derive(Debug, thiserror::Error)]
pub enum MalformedFrame {
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
    #[error("frame declares {0} hands, max is {MAX_HANDS}")]
    TooManyHands(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tests::sample_hand;
    use crate::reader::StreamReader;

    fn roundtrip(frame: &Frame) -> Frame {
        let message = encode_frame(frame).unwrap();
        let declared = u64::from_be_bytes(message[..LEN_SIZE].try_into().unwrap()) as usize;
        assert_eq!(declared, message.len() - LEN_SIZE);
        decode_payload(&message[LEN_SIZE..]).unwrap()
    }

    #[test]
    fn roundtrip_no_hands() {
        let frame = Frame::pose_only(Vec::new());
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn roundtrip_one_and_two_hands() {
        for hands in [
            vec![sample_hand(0.1)],
            vec![sample_hand(0.1), sample_hand(0.7)],
        ] {
            let frame = Frame::pose_only(hands);
            assert_eq!(roundtrip(&frame), frame);
        }
    }

    #[test]
    fn roundtrip_with_image() {
        let jpeg: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
        let frame = Frame::with_image(vec![sample_hand(0.2)], jpeg);
        let decoded = roundtrip(&frame);
        assert_eq!(decoded, frame);
        assert!(decoded.has_image());
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let message = encode_frame(&Frame::pose_only(vec![sample_hand(0.5)])).unwrap();
        let payload = &message[LEN_SIZE..];
        assert!(matches!(
            decode_payload(&payload[..payload.len() - 3]),
            Err(MalformedFrame::Decode(_))
        ));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        // A bincode Vec length pointing far past the buffer.
        let payload = [0xffu8; 16];
        assert!(decode_payload(&payload).is_err());
    }

    #[test]
    fn too_many_hands_rejected() {
        // Hand-build a payload with 3 hands; Frame constructors cap at 2,
        // so serialize the raw tuple shape the frame encodes to.
        let hands = vec![sample_hand(0.1), sample_hand(0.2), sample_hand(0.3)];
        #[derive(serde::Serialize)]
        struct RawFrame {
            hands: Vec<crate::protocol::Hand>,
            image: Vec<u8>,
        }
        let payload = bincode::serialize(&RawFrame {
            hands,
            image: Vec::new(),
        })
        .unwrap();
        assert!(matches!(
            decode_payload(&payload),
            Err(MalformedFrame::TooManyHands(3))
        ));
    }

    #[test]
    fn two_messages_back_to_back() {
        let a = Frame::pose_only(vec![sample_hand(0.3)]);
        let b = Frame::with_image(Vec::new(), vec![1, 2, 3]);
        let mut buf = encode_frame(&a).unwrap();
        buf.extend_from_slice(&encode_frame(&b).unwrap());

        let mut reader = StreamReader::new();
        reader.feed(&buf);
        let p1 = reader.next_frame().unwrap().unwrap();
        let p2 = reader.next_frame().unwrap().unwrap();
        assert_eq!(decode_payload(&p1).unwrap(), a);
        assert_eq!(decode_payload(&p2).unwrap(), b);
        assert!(reader.next_frame().unwrap().is_none());
    }
}
