//! Error types for wiregate client operations.
//!
//! Errors local to a single message or produce call are reported to that
//! call's result and never affect subsequent calls. The only process-fatal
//! conditions are configuration errors detected at construction.

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Produce call against a topic that has no schema binding.
    ///
    /// Caller error, reported synchronously. Distinct from
    /// `SchemaRegistrationFailed`: here the schema was never submitted.
    #[error("No schema registered for topic '{0}'")]
    UnknownTopicSchema(String),

    /// The registry rejected this subject's schema at startup.
    ///
    /// The diagnostic is cached in the binding table and repeated verbatim
    /// on every produce call for the subject; this layer does not auto-retry
    /// registration.
    #[error("Schema registration failed for subject '{subject}': {diagnostic}")]
    SchemaRegistrationFailed { subject: String, diagnostic: String },

    /// The registry call itself failed (unreachable, bad status, unparseable
    /// response body).
    #[error("Schema registry error: {0}")]
    SchemaRegistryError(String),

    /// Consumer-side schema resolution failed; the message carrying this id
    /// is dropped and the error surfaced.
    #[error("Schema lookup failed for id {schema_id}: {reason}")]
    SchemaLookupFailed { schema_id: u32, reason: String },

    /// Envelope or structured-codec failure.
    #[error("Wire format error: {0}")]
    Wire(#[from] wiregate_core::WireError),

    /// The broker transport refused a send or connect.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Invalid gateway/dispatcher configuration (missing required builder
    /// field, empty topic list, duplicate schema name).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A queued produce call's completion channel was dropped before the
    /// call was replayed.
    #[error("Produce call was dropped before completing")]
    OutcomeDropped,

    /// `wait_outcome()` called twice on the same queued result.
    #[error("Produce outcome already consumed")]
    OutcomeAlreadyConsumed,
}
