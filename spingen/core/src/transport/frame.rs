//! Frame Protocol
//!
//! Wire format for envelopes crossing a byte stream: length-prefixed JSON with
//! a CRC32 checksum.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+----------------+------------------------------------------+
//! | Length (4)     | Checksum (4)   | JSON Payload (variable)                  |
//! | big-endian u32 | CRC32 (BE)     | WorkerRequest or WorkerMessage           |
//! +----------------+----------------+------------------------------------------+
//! ```
//!
//! Length counts the payload only. Images and archives travel inside the JSON
//! as hex strings, so the frame limit is generous.

use serde::{de::DeserializeOwned, Serialize};

use super::TransportError;

/// Maximum payload size (32 MB)
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Frame header size: 4 bytes length + 4 bytes checksum
const HEADER_SIZE: usize = 8;

/// Consumed bytes are compacted away once this many have piled up
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Encode an envelope into one frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if serialization fails or the
/// payload exceeds `MAX_FRAME_SIZE`.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, TransportError> {
    let payload =
        serde_json::to_vec(msg).map_err(|e| TransportError::SerializationError(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            TransportError::SerializationError(format!(
                "Frame too large: {} bytes (max: {MAX_FRAME_SIZE})",
                payload.len()
            ))
        })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Incremental frame parser
///
/// Bytes are pushed as they arrive from the stream; complete envelopes are
/// pulled out one at a time with [`FrameDecoder::decode`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Start of the first undecoded byte in `buffer`
    cursor: usize,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn push(&mut self, data: &[u8]) {
        if self.cursor >= COMPACT_THRESHOLD && self.cursor * 2 > self.buffer.len() {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Decode the next complete frame
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// - `TransportError::SerializationError` for oversized frames or JSON that
    ///   doesn't match `T`
    /// - `TransportError::ChecksumMismatch` for corrupted payloads
    ///
    /// An oversized length leaves no frame boundary to resume from, so the
    /// decoder keeps failing on it; the stream must be closed.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        let rest = &self.buffer[self.cursor..];
        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::SerializationError(format!(
                "Frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }
        if rest.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        let expected = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let payload = &rest[HEADER_SIZE..HEADER_SIZE + len];
        let actual = crc32fast::hash(payload);

        self.cursor += HEADER_SIZE + len;

        if actual != expected {
            return Err(TransportError::ChecksumMismatch { expected, actual });
        }

        serde_json::from_slice(payload)
            .map(Some)
            .map_err(|e| TransportError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ImageData, Seq, WorkerMessage};
    use crate::model::{ArchiveFile, GenerationOptions, SprayId, SpriteScale};
    use crate::requests::{GenerateOp, WorkerRequest};

    fn animation_request(seq: u64) -> WorkerRequest {
        WorkerRequest::Generate {
            seq: Seq(seq),
            op: GenerateOp::SkinAnimation {
                skin: "sonic".to_string(),
                spray_id: Some(SprayId::new("blue")),
                options: GenerationOptions::new("STIN", "A", SpriteScale::X4),
            },
        }
    }

    #[test]
    fn test_frame_header_layout() {
        let frame = encode(&animation_request(1)).unwrap();

        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - HEADER_SIZE);

        let crc = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
        assert_eq!(crc, crc32fast::hash(&frame[HEADER_SIZE..]));
    }

    #[test]
    fn test_decode_split_delivery() {
        let msg = WorkerMessage::GenerateResult {
            seq: Seq(9),
            image: ImageData::new(vec![7u8; 300], "image/gif"),
        };
        let frame = encode(&msg).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&frame[..5]);
        assert!(decoder.decode::<WorkerMessage>().unwrap().is_none());

        decoder.push(&frame[5..frame.len() - 1]);
        assert!(decoder.decode::<WorkerMessage>().unwrap().is_none());

        decoder.push(&frame[frame.len() - 1..]);
        assert_eq!(decoder.decode::<WorkerMessage>().unwrap(), Some(msg));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut bytes = encode(&animation_request(1)).unwrap();
        bytes.extend(encode(&animation_request(2)).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);

        let first: WorkerRequest = decoder.decode().unwrap().unwrap();
        let second: WorkerRequest = decoder.decode().unwrap().unwrap();
        assert_eq!(first.seq(), Seq(1));
        assert_eq!(second.seq(), Seq(2));
        assert!(decoder.decode::<WorkerRequest>().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_frame_is_skipped() {
        let mut bad = encode(&animation_request(1)).unwrap();
        let last = bad.len() - 2;
        bad[last] ^= 0xff;
        bad.extend(encode(&animation_request(2)).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&bad);

        assert!(matches!(
            decoder.decode::<WorkerRequest>(),
            Err(TransportError::ChecksumMismatch { .. })
        ));
        let next: WorkerRequest = decoder.decode().unwrap().unwrap();
        assert_eq!(next.seq(), Seq(2));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&((MAX_FRAME_SIZE + 1) as u32).to_be_bytes());
        decoder.push(&[0u8; 4]);

        assert!(matches!(
            decoder.decode::<WorkerMessage>(),
            Err(TransportError::SerializationError(_))
        ));

        // Body bytes of the oversized frame are never read as a header
        decoder.push(&encode(&animation_request(2)).unwrap());
        assert!(matches!(
            decoder.decode::<WorkerRequest>(),
            Err(TransportError::SerializationError(_))
        ));
    }

    #[test]
    fn test_encode_rejects_hex_blowup_past_the_limit() {
        // Byte fields travel as hex, so 17 MB of archive needs 34 MB of frame
        let request = WorkerRequest::file_submitted(
            Seq(1),
            ArchiveFile::new("huge.pk3", vec![0u8; 17 * 1024 * 1024]),
        );

        assert!(matches!(
            encode(&request),
            Err(TransportError::SerializationError(_))
        ));
    }

    #[test]
    fn test_wrong_envelope_type_rejected() {
        let frame = encode(&animation_request(1)).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame);

        assert!(matches!(
            decoder.decode::<WorkerMessage>(),
            Err(TransportError::SerializationError(_))
        ));
    }
}
