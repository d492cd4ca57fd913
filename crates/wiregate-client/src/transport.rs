//! Broker Transport Seam
//!
//! The broker client library owns connections, partitioning, delivery
//! acknowledgement and network-level retries. This crate only needs two
//! calls, `connect` and `send`, plus the transport's event stream:
//!
//! ```text
//! ┌───────────────────┐   connect()/send()   ┌───────────────────┐
//! │  ProducerGateway  │ ───────────────────▶ │  BrokerTransport  │
//! │  ConsumerDispatch │ ◀─────────────────── │  (rdkafka, ...)   │
//! └───────────────────┘   TransportEvent     └───────────────────┘
//! ```
//!
//! Events are delivered over a `tokio::sync::mpsc` channel rather than
//! per-call listener registration, so readiness is observed exactly once per
//! transition by whoever drives the gateway's event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{ClientError, Result};

/// Events surfaced by a broker transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport will now accept sends without error.
    Ready,

    /// The transport lost its broker connection.
    Disconnected,

    /// An inbound message from a subscribed topic.
    Message { topic: String, payload: Bytes },

    /// Broker acknowledgement for an earlier send. Asynchronous and carries
    /// no ordering relationship with produce-call results.
    DeliveryReport { topic: String, error: Option<String> },
}

/// Minimal surface this layer requires of a broker client.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Start connecting. Readiness arrives later as [`TransportEvent::Ready`].
    async fn connect(&self) -> Result<()>;

    /// Hand wire bytes to the broker client.
    ///
    /// Success means the transport accepted the call locally, not that the
    /// broker acknowledged delivery; that is reported separately via
    /// [`TransportEvent::DeliveryReport`].
    async fn send(&self, topic: &str, payload: Bytes) -> Result<()>;
}

/// In-process transport that records sends and lets the caller script
/// readiness, disconnects and inbound traffic. Stands in for a real broker
/// client in tests and examples.
pub struct InMemoryTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Mutex<Vec<(String, Bytes)>>,
    fail_sends: AtomicBool,
}

impl InMemoryTransport {
    /// Create the transport plus the event stream its signals feed into.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            events: tx,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        });
        (transport, rx)
    }

    /// Signal readiness, as a broker client would after connecting.
    pub fn signal_ready(&self) {
        let _ = self.events.send(TransportEvent::Ready);
    }

    pub fn signal_disconnected(&self) {
        let _ = self.events.send(TransportEvent::Disconnected);
    }

    /// Inject an inbound message, as if delivered by the broker.
    pub fn inject_message(&self, topic: &str, payload: Bytes) {
        let _ = self.events.send(TransportEvent::Message {
            topic: topic.to_string(),
            payload,
        });
    }

    /// Make subsequent `send` calls fail, simulating a dead broker client.
    pub fn set_send_failure(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages accepted so far, in submission order.
    pub fn sent(&self) -> Vec<(String, Bytes)> {
        self.sent.lock().expect("sent log poisoned").clone()
    }
}

#[async_trait]
impl BrokerTransport for InMemoryTransport {
    async fn connect(&self) -> Result<()> {
        // Readiness is scripted by the test or demo driving the transport.
        Ok(())
    }

    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ClientError::TransportError(format!(
                "send to '{topic}' refused: transport disconnected"
            )));
        }

        self.sent
            .lock()
            .expect("sent log poisoned")
            .push((topic.to_string(), payload));

        let _ = self.events.send(TransportEvent::DeliveryReport {
            topic: topic.to_string(),
            error: None,
        });
        Ok(())
    }
}
