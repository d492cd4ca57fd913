//! Wiregate Client - Producer Gateway and Consumer Dispatcher
//!
//! A schema-registry-aware framing layer between an application and a
//! message broker client. Given structured records and a set of named
//! schemas, it produces and parses messages in the self-describing
//! Confluent-style wire format, keeps the registry's schema-to-id mapping
//! cached, and never drops application calls made before the underlying
//! transport is ready.
//!
//! # Examples
//!
//! ## Producer
//!
//! ```ignore
//! use wiregate_client::{ProducerGateway, SchemaRegistryClient};
//! use wiregate_core::Schema;
//!
//! let registry = Arc::new(SchemaRegistryClient::new("http://localhost:8081")?);
//!
//! let gateway = Arc::new(
//!     ProducerGateway::builder()
//!         .registry(registry)
//!         .transport(transport)
//!         .schema(Schema::from_definition(definition)?)
//!         .build()
//!         .await?,
//! );
//! tokio::spawn(Arc::clone(&gateway).run(transport_events));
//!
//! // Queued if the transport is not ready yet, sent immediately otherwise.
//! let mut result = gateway.produce("example", record).await?;
//! result.wait_outcome().await?;
//! ```
//!
//! ## Consumer
//!
//! ```ignore
//! use wiregate_client::ConsumerDispatcher;
//!
//! let dispatcher = Arc::new(
//!     ConsumerDispatcher::builder()
//!         .registry(registry)
//!         .topic("example")
//!         .handler(|record| println!("{:?}", record.value))
//!         .build()?,
//! );
//! tokio::spawn(Arc::clone(&dispatcher).run(transport_events));
//! ```

pub mod consumer;
pub mod error;
pub mod producer;
pub mod registry;
pub mod transport;

pub use consumer::{ConsumerDispatcher, ConsumerDispatcherBuilder, DecodedRecord};
pub use error::{ClientError, Result};
pub use producer::{DisconnectPolicy, ProduceResult, ProducerGateway, ProducerGatewayBuilder};
pub use registry::SchemaRegistryClient;
pub use transport::{BrokerTransport, InMemoryTransport, TransportEvent};
