//! Producer Gateway
//!
//! Owns the per-topic schema bindings, buffers produce calls received before
//! the broker transport is ready, and turns application records into
//! wire-format bytes handed to the transport.
//!
//! ## Readiness state machine
//!
//! ```text
//!            build(): register all schemas, connect transport
//!                              │
//!                              ▼
//!                        ┌───────────┐   produce() ──▶ queue (FIFO)
//!                        │ NotReady  │
//!                        └─────┬─────┘
//!          TransportEvent::Ready │  drain queue, strictly FIFO
//!                              ▼
//!                        ┌───────────┐   produce() ──▶ encode + send
//!                        │   Ready   │
//!                        └─────┬─────┘
//!     TransportEvent::Disconnected │  DisconnectPolicy::Requeue only
//!                              ▼
//!                        (back to NotReady)
//! ```
//!
//! Schema registration completes inside `build()`, before the transport is
//! even asked to connect, so the `Ready` signal is the one remaining gate.
//! A transport that reports ready before registration finishes simply has
//! its event sit in the channel until the event loop starts.
//!
//! A call made while NotReady never fails synchronously; it is queued and
//! replayed exactly once when the gate opens. Each queued call carries a
//! oneshot completion channel so the caller can await the eventual outcome.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use apache_avro::types::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};
use wiregate_core::{envelope, AvroCodec, Schema};

use crate::error::{ClientError, Result};
use crate::registry::SchemaRegistryClient;
use crate::transport::{BrokerTransport, TransportEvent};

/// Default buffer capacity hint handed to the structured encoder.
const DEFAULT_CAPACITY_HINT: usize = 10_240;

/// What the gateway does when the transport reports a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectPolicy {
    /// Return to NotReady and queue produce calls until the next Ready.
    Requeue,
    /// Stay Ready and let sends fail at the transport until it recovers.
    FailFast,
}

/// Outcome of registering one subject. One binding per subject; bindings
/// never change after creation, only the table grows.
enum SchemaBinding {
    Bound {
        schema_id: u32,
        codec: Arc<AvroCodec>,
    },
    Failed {
        diagnostic: String,
    },
}

/// A produce call captured while the gateway was not ready.
///
/// Created on produce-while-not-ready, destroyed exactly once when the
/// readiness transition replays it.
struct PendingCall {
    topic: String,
    value: Value,
    outcome: oneshot::Sender<Result<()>>,
}

/// Mutable gateway state. Readiness flag and pending queue live under one
/// mutex so a concurrent produce call can never observe a half-applied
/// transition and misqueue.
struct GatewayState {
    ready: bool,
    pending: VecDeque<PendingCall>,
}

/// Result of a `produce` call.
///
/// A call made while the gateway is ready has already been handed to the
/// transport when this returns. A queued call resolves later, when the
/// readiness transition replays it; `wait_outcome` covers both cases.
#[derive(Debug)]
pub struct ProduceResult {
    queued: bool,
    outcome: Option<oneshot::Receiver<Result<()>>>,
}

impl ProduceResult {
    fn accepted() -> Self {
        Self {
            queued: false,
            outcome: None,
        }
    }

    fn deferred(outcome: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            queued: true,
            outcome: Some(outcome),
        }
    }

    /// True when the call was deferred to the pending queue.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Wait for the final outcome of this call.
    ///
    /// Resolves immediately for a call accepted while Ready. For a queued
    /// call, blocks until the drain replays it. Calling twice on a queued
    /// result returns `OutcomeAlreadyConsumed`.
    pub async fn wait_outcome(&mut self) -> Result<()> {
        match self.outcome.take() {
            Some(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(ClientError::OutcomeDropped),
            },
            None if self.queued => Err(ClientError::OutcomeAlreadyConsumed),
            None => Ok(()),
        }
    }
}

/// Schema-registry-aware producer gateway.
///
/// Sits between the application and the broker transport: registers the
/// application's schemas at startup, frames records in the self-describing
/// wire format, and guarantees that calls made before the transport is
/// ready are deferred, never dropped or failed.
pub struct ProducerGateway {
    transport: Arc<dyn BrokerTransport>,

    /// topic → registration outcome. Built once at startup; entries are
    /// immutable afterwards, so reads take no lock.
    bindings: HashMap<String, SchemaBinding>,

    state: Mutex<GatewayState>,
    disconnect_policy: DisconnectPolicy,
    capacity_hint: usize,
}

impl ProducerGateway {
    pub fn builder() -> ProducerGatewayBuilder {
        ProducerGatewayBuilder::new()
    }

    /// Produce a structured record to `topic`.
    ///
    /// While the gateway is not ready the call is queued and this returns a
    /// deferred [`ProduceResult`]; it does not fail. Once ready, the record
    /// is encoded with the topic's bound schema and handed to the transport
    /// synchronously; success means the transport accepted the call locally.
    pub async fn produce(&self, topic: &str, value: Value) -> Result<ProduceResult> {
        {
            let mut state = self.state.lock().await;
            if !state.ready {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(PendingCall {
                    topic: topic.to_string(),
                    value,
                    outcome: tx,
                });
                debug!(
                    topic,
                    queued = state.pending.len(),
                    "Gateway not ready, produce call queued"
                );
                return Ok(ProduceResult::deferred(rx));
            }
        }

        self.dispatch(topic, &value).await?;
        Ok(ProduceResult::accepted())
    }

    /// Ready-path produce: binding lookup, envelope encode, transport send.
    async fn dispatch(&self, topic: &str, value: &Value) -> Result<()> {
        let binding = self
            .bindings
            .get(topic)
            .ok_or_else(|| ClientError::UnknownTopicSchema(topic.to_string()))?;

        match binding {
            SchemaBinding::Failed { diagnostic } => {
                Err(ClientError::SchemaRegistrationFailed {
                    subject: topic.to_string(),
                    diagnostic: diagnostic.clone(),
                })
            }
            SchemaBinding::Bound { schema_id, codec } => {
                let bytes =
                    envelope::encode_value(*schema_id, value, codec.as_ref(), self.capacity_hint)?;
                self.transport.send(topic, bytes).await?;
                trace!(topic, schema_id = *schema_id, "Record handed to transport");
                Ok(())
            }
        }
    }

    /// Apply one transport event to the state machine.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Ready => self.transport_ready().await,
            TransportEvent::Disconnected => self.transport_disconnected().await,
            TransportEvent::DeliveryReport { topic, error } => match error {
                Some(err) => warn!(topic, error = %err, "Delivery report carried an error"),
                None => trace!(topic, "Delivery report"),
            },
            TransportEvent::Message { topic, .. } => {
                trace!(topic, "Ignoring inbound message on producer transport");
            }
        }
    }

    /// NotReady → Ready transition: open the gate and drain the pending
    /// queue strictly FIFO.
    pub async fn transport_ready(&self) {
        let drained = {
            let mut state = self.state.lock().await;
            if state.ready {
                return;
            }
            state.ready = true;
            std::mem::take(&mut state.pending)
        };

        if !drained.is_empty() {
            info!(count = drained.len(), "Transport ready, draining queued produce calls");
        }
        self.drain(drained).await;
    }

    /// Ready → NotReady on disconnect, under `DisconnectPolicy::Requeue`.
    pub async fn transport_disconnected(&self) {
        match self.disconnect_policy {
            DisconnectPolicy::Requeue => {
                let mut state = self.state.lock().await;
                state.ready = false;
                info!("Transport disconnected, queuing produce calls until reconnect");
            }
            DisconnectPolicy::FailFast => {
                warn!("Transport disconnected, produce calls will fail at the transport");
            }
        }
    }

    /// Replay drained calls in submission order.
    ///
    /// Each call is applied at most once per transition: if a disconnect
    /// closes the gate mid-drain, the remainder goes back to the front of
    /// the pending queue (ahead of any call queued after the gate closed,
    /// preserving submission order) and waits for the next transition. The
    /// loop iterates a finite snapshot, so the drain always terminates.
    async fn drain(&self, mut calls: VecDeque<PendingCall>) {
        while let Some(call) = calls.pop_front() {
            {
                let mut state = self.state.lock().await;
                if !state.ready {
                    calls.push_front(call);
                    while let Some(deferred) = calls.pop_back() {
                        state.pending.push_front(deferred);
                    }
                    debug!(
                        requeued = state.pending.len(),
                        "Gate closed mid-drain, re-queuing remaining calls"
                    );
                    return;
                }
            }

            let result = self.dispatch(&call.topic, &call.value).await;
            if let Err(e) = &result {
                warn!(topic = %call.topic, error = %e, "Queued produce call failed on replay");
            }
            // Receiver may have been dropped by an uninterested caller.
            let _ = call.outcome.send(result);
        }
    }

    /// Drive the gateway from a transport event stream until the sender
    /// side closes. Typically spawned:
    ///
    /// ```ignore
    /// let gateway = Arc::new(gateway);
    /// tokio::spawn(Arc::clone(&gateway).run(events));
    /// ```
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Transport event stream closed, gateway event loop exiting");
    }
}

/// Builder for configuring and creating a [`ProducerGateway`].
pub struct ProducerGatewayBuilder {
    registry: Option<Arc<SchemaRegistryClient>>,
    transport: Option<Arc<dyn BrokerTransport>>,
    schemas: Vec<Schema>,
    disconnect_policy: DisconnectPolicy,
    capacity_hint: usize,
}

impl ProducerGatewayBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            transport: None,
            schemas: Vec::new(),
            disconnect_policy: DisconnectPolicy::Requeue,
            capacity_hint: DEFAULT_CAPACITY_HINT,
        }
    }

    /// Set the schema registry client (required).
    pub fn registry(mut self, registry: Arc<SchemaRegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the broker transport (required).
    pub fn transport(mut self, transport: Arc<dyn BrokerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Schemas to register at build time, one per topic.
    pub fn schemas(mut self, schemas: Vec<Schema>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Behavior on transport disconnect (default: `Requeue`).
    pub fn disconnect_policy(mut self, policy: DisconnectPolicy) -> Self {
        self.disconnect_policy = policy;
        self
    }

    /// Initial encode buffer capacity (default: 10240 bytes). Undersized
    /// hints still encode correctly, at the cost of a growth retry.
    pub fn encode_capacity_hint(mut self, hint: usize) -> Self {
        self.capacity_hint = hint;
        self
    }

    /// Register every schema, connect the transport, and return the gateway
    /// in the NotReady state.
    ///
    /// Registration outcomes are independent: one subject failing does not
    /// abort the others, and a failed subject yields a binding that reports
    /// its diagnostic on every produce call rather than disappearing.
    pub async fn build(self) -> Result<ProducerGateway> {
        let registry = self
            .registry
            .ok_or_else(|| ClientError::ConfigError("registry is required".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| ClientError::ConfigError("transport is required".to_string()))?;
        if self.schemas.is_empty() {
            return Err(ClientError::ConfigError(
                "at least one schema is required".to_string(),
            ));
        }

        let mut bindings = HashMap::new();
        for schema in &self.schemas {
            let subject = schema.subject().to_string();
            if bindings.contains_key(&subject) {
                return Err(ClientError::ConfigError(format!(
                    "duplicate schema name '{subject}'"
                )));
            }
            bindings.insert(subject, Self::register_one(&registry, schema).await);
        }

        let bound = bindings
            .values()
            .filter(|b| matches!(b, SchemaBinding::Bound { .. }))
            .count();
        info!(
            subjects = bindings.len(),
            bound,
            failed = bindings.len() - bound,
            "Schema registration processing complete"
        );

        transport.connect().await?;

        Ok(ProducerGateway {
            transport,
            bindings,
            state: Mutex::new(GatewayState {
                ready: false,
                pending: VecDeque::new(),
            }),
            disconnect_policy: self.disconnect_policy,
            capacity_hint: self.capacity_hint,
        })
    }

    async fn register_one(registry: &SchemaRegistryClient, schema: &Schema) -> SchemaBinding {
        let codec = match AvroCodec::parse(schema) {
            Ok(codec) => Arc::new(codec),
            Err(e) => {
                error!(subject = schema.subject(), error = %e, "Schema definition failed to parse");
                return SchemaBinding::Failed {
                    diagnostic: e.to_string(),
                };
            }
        };

        match registry.register(schema.subject(), schema).await {
            Ok(schema_id) => {
                info!(subject = schema.subject(), schema_id, "Schema registered");
                SchemaBinding::Bound { schema_id, codec }
            }
            Err(e) => {
                error!(subject = schema.subject(), error = %e, "Schema registration failed");
                SchemaBinding::Failed {
                    diagnostic: e.to_string(),
                }
            }
        }
    }
}

impl Default for ProducerGatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
