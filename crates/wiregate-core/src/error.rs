//! Wire-Level Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WireError>;

#[derive(Error, Debug)]
pub enum WireError {
    /// The envelope is shorter than the fixed header or carries the wrong
    /// sentinel byte. Fatal to that single message, never to the process.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The structured encoder could not fit its output into the buffer it
    /// was handed. Consumed by the envelope's growth loop; `needed` is the
    /// total buffer length that would suffice.
    #[error("Encode buffer too small: need {needed} bytes, have {capacity}")]
    EncodeBufferTooSmall { needed: usize, capacity: usize },

    #[error("Invalid schema definition: {0}")]
    InvalidSchema(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
