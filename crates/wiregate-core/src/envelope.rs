//! Self-Describing Message Envelope
//!
//! Utilities for encoding/decoding messages with embedded schema IDs.
//!
//! Format: [magic_byte(1)][schema_id(4)][payload(N)]
//!
//! The envelope is fixed-width and self-describing so a consumer needs no
//! side channel beyond the registry to decode arbitrary topics.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::StructuredEncoder;
use crate::error::{Result, WireError};

/// Magic byte indicating a schema ID is present.
pub const MAGIC_BYTE: u8 = 0x00;

/// Fixed header length: magic byte plus 4-byte schema ID.
pub const HEADER_LEN: usize = 5;

/// Frame an already-encoded payload with the envelope header.
pub fn encode(schema_id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());

    buf.put_u8(MAGIC_BYTE);

    // Schema ID (big-endian for compatibility with Confluent)
    buf.put_u32(schema_id);

    buf.put_slice(payload);

    buf.freeze()
}

/// Split an envelope into its schema ID and payload.
///
/// Fails with [`WireError::MalformedEnvelope`] when the input is shorter
/// than the header or the sentinel byte mismatches. A zero-length payload is
/// valid.
pub fn decode(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < HEADER_LEN {
        return Err(WireError::MalformedEnvelope(format!(
            "{} bytes is too short to contain a schema ID",
            data.len()
        )));
    }

    if data[0] != MAGIC_BYTE {
        return Err(WireError::MalformedEnvelope(format!(
            "invalid magic byte: expected 0x00, got 0x{:02x}",
            data[0]
        )));
    }

    let mut id_bytes = &data[1..HEADER_LEN];
    let schema_id = id_bytes.get_u32();

    Ok((schema_id, &data[HEADER_LEN..]))
}

/// Encode a structured value directly into an envelope.
///
/// The encoder writes after the header into a buffer of `capacity_hint`
/// bytes. When it signals [`WireError::EncodeBufferTooSmall`] the buffer is
/// regrown to `max(2 * capacity, needed)` and the write retried; capacity
/// is strictly monotonic, so the loop terminates and output is never
/// truncated. Returns the exact-length frame with no trailing garbage.
pub fn encode_value(
    schema_id: u32,
    value: &apache_avro::types::Value,
    encoder: &dyn StructuredEncoder,
    capacity_hint: usize,
) -> Result<Bytes> {
    let mut capacity = capacity_hint.max(HEADER_LEN);

    loop {
        let mut buf = vec![0u8; capacity];
        buf[0] = MAGIC_BYTE;
        buf[1..HEADER_LEN].copy_from_slice(&schema_id.to_be_bytes());

        match encoder.encode(value, &mut buf, HEADER_LEN) {
            Ok(end) => {
                buf.truncate(end);
                return Ok(Bytes::from(buf));
            }
            Err(WireError::EncodeBufferTooSmall { needed, .. }) => {
                capacity = (capacity * 2).max(needed);
            }
            Err(e) => return Err(e),
        }
    }
}
