//! Structured Encoder/Decoder Seam
//!
//! The framing layer never interprets record contents itself; it drives a
//! structured codec through these two traits. `AvroCodec` is the production
//! implementation, wrapping one parsed `apache_avro::Schema` in both roles.

use apache_avro::types::Value;
use apache_avro::{from_avro_datum, to_avro_datum};

use crate::error::{Result, WireError};
use crate::schema::Schema;

/// Writes a structured value into a caller-supplied buffer.
pub trait StructuredEncoder: Send + Sync {
    /// Encode `value` into `buf` starting at `offset` and return the end
    /// offset of the written bytes.
    ///
    /// When the encoding does not fit, fails with
    /// [`WireError::EncodeBufferTooSmall`] carrying the total buffer length
    /// that would suffice. Implementations must never truncate.
    fn encode(&self, value: &Value, buf: &mut [u8], offset: usize) -> Result<usize>;
}

/// Decodes payload bytes back into a structured value.
pub trait StructuredDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<Value>;
}

/// Avro codec for a single parsed schema definition.
///
/// One instance serves both directions: the producer gateway uses it as a
/// [`StructuredEncoder`], the registry's decoder cache holds it as a
/// [`StructuredDecoder`].
#[derive(Debug)]
pub struct AvroCodec {
    schema: apache_avro::Schema,
}

impl AvroCodec {
    /// Parse a [`Schema`]'s JSON definition into an Avro codec.
    pub fn parse(schema: &Schema) -> Result<Self> {
        Self::parse_str(&schema.definition_json()?)
    }

    /// Parse a raw JSON definition string, as fetched from the registry.
    pub fn parse_str(definition: &str) -> Result<Self> {
        let schema = apache_avro::Schema::parse_str(definition)
            .map_err(|e| WireError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &apache_avro::Schema {
        &self.schema
    }
}

impl StructuredEncoder for AvroCodec {
    fn encode(&self, value: &Value, buf: &mut [u8], offset: usize) -> Result<usize> {
        let datum = to_avro_datum(&self.schema, value.clone())
            .map_err(|e| WireError::SerializationError(e.to_string()))?;
        let end = offset + datum.len();
        if end > buf.len() {
            return Err(WireError::EncodeBufferTooSmall {
                needed: end,
                capacity: buf.len(),
            });
        }
        buf[offset..end].copy_from_slice(&datum);
        Ok(end)
    }
}

impl StructuredDecoder for AvroCodec {
    fn decode(&self, payload: &[u8]) -> Result<Value> {
        from_avro_datum(&self.schema, &mut &payload[..], None)
            .map_err(|e| WireError::DeserializationError(e.to_string()))
    }
}
