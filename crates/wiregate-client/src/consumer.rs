//! Consumer Dispatcher
//!
//! Stateless per message: each inbound payload is split by the envelope
//! codec, its schema resolved through the registry client (cache-first),
//! its body decoded, and the application handler invoked exactly once.
//! Failures at any step drop that message and surface the error through the
//! error handler; the dispatch loop itself never dies. Handler invocation is
//! synchronous relative to message arrival, so delivery order is preserved.

use std::sync::Arc;

use apache_avro::types::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use wiregate_core::{envelope, StructuredDecoder};

use crate::error::{ClientError, Result};
use crate::registry::SchemaRegistryClient;
use crate::transport::TransportEvent;

/// A decoded inbound record handed to the application.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub topic: String,
    pub schema_id: u32,
    pub value: Value,
}

type RecordHandler = Box<dyn Fn(DecodedRecord) + Send + Sync>;
type ErrorHandler = Box<dyn Fn(ClientError) + Send + Sync>;

pub struct ConsumerDispatcher {
    registry: Arc<SchemaRegistryClient>,
    topics: Vec<String>,
    handler: RecordHandler,
    on_error: ErrorHandler,
}

impl ConsumerDispatcher {
    pub fn builder() -> ConsumerDispatcherBuilder {
        ConsumerDispatcherBuilder::new()
    }

    /// Topics this dispatcher expects; hand these to the transport's
    /// subscribe call.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Process one inbound message.
    ///
    /// On success the handler runs exactly once with the decoded record. On
    /// any failure (malformed envelope, failed schema lookup, payload decode
    /// error) the message is dropped and the error handler runs instead.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) {
        match self.decode(topic, payload).await {
            Ok(record) => {
                trace!(topic, schema_id = record.schema_id, "Dispatching decoded record");
                (self.handler)(record);
            }
            Err(e) => {
                warn!(topic, error = %e, "Dropping inbound message");
                (self.on_error)(e);
            }
        }
    }

    async fn decode(&self, topic: &str, payload: &[u8]) -> Result<DecodedRecord> {
        let (schema_id, body) = envelope::decode(payload)?;
        let codec = self.registry.resolve(schema_id).await?;
        let value = codec.decode(body)?;
        Ok(DecodedRecord {
            topic: topic.to_string(),
            schema_id,
            value,
        })
    }

    /// Drive the dispatcher from a transport event stream until the sender
    /// side closes. Messages are handled one at a time, in delivery order.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message { topic, payload } => {
                    self.dispatch(&topic, &payload).await;
                }
                TransportEvent::Ready => {
                    debug!(topics = ?self.topics, "Consumer transport ready");
                }
                TransportEvent::Disconnected => {
                    debug!("Consumer transport disconnected");
                }
                TransportEvent::DeliveryReport { .. } => {}
            }
        }
        debug!("Transport event stream closed, dispatcher exiting");
    }
}

/// Builder for constructing a [`ConsumerDispatcher`].
pub struct ConsumerDispatcherBuilder {
    registry: Option<Arc<SchemaRegistryClient>>,
    topics: Vec<String>,
    handler: Option<RecordHandler>,
    on_error: Option<ErrorHandler>,
}

impl ConsumerDispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            topics: Vec::new(),
            handler: None,
            on_error: None,
        }
    }

    /// Set the schema registry client (required).
    pub fn registry(mut self, registry: Arc<SchemaRegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Topics to subscribe to (at least one required).
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.push(topic.into());
        self
    }

    /// Application handler invoked once per decoded record (required).
    pub fn handler(mut self, handler: impl Fn(DecodedRecord) + Send + Sync + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Handler for per-message decode/lookup failures. Defaults to logging
    /// the dropped message.
    pub fn on_error(mut self, on_error: impl Fn(ClientError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    pub fn build(self) -> Result<ConsumerDispatcher> {
        let registry = self
            .registry
            .ok_or_else(|| ClientError::ConfigError("registry is required".to_string()))?;
        let handler = self
            .handler
            .ok_or_else(|| ClientError::ConfigError("handler is required".to_string()))?;
        if self.topics.is_empty() {
            return Err(ClientError::ConfigError(
                "at least one topic is required".to_string(),
            ));
        }

        let on_error = self
            .on_error
            .unwrap_or_else(|| Box::new(|err| warn!(error = %err, "Inbound message dropped")));

        Ok(ConsumerDispatcher {
            registry,
            topics: self.topics,
            handler,
            on_error,
        })
    }
}

impl Default for ConsumerDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
