//! Wire-format primitives for schema-registry framed messages.
//!
//! This crate covers the pure, I/O-free half of the framing layer: the
//! self-describing message envelope (magic byte + schema id + payload), the
//! structured encoder/decoder seam, and the Avro implementation of that seam.
//! Everything network-facing lives in `wiregate-client`.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod schema;

pub use codec::{AvroCodec, StructuredDecoder, StructuredEncoder};
pub use error::{Result, WireError};
pub use schema::Schema;
