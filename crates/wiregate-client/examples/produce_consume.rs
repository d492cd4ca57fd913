//! Produce/Consume Demo
//!
//! Runs the whole framing layer in one process: a stubbed schema registry,
//! a loopback transport, a producer gateway and a consumer dispatcher.
//! Records produced before the transport reports ready are queued and
//! drained once it does.
//!
//! Run with `cargo run --example produce_consume`.

use std::sync::Arc;

use apache_avro::types::Value;
use wiregate_client::{
    BrokerTransport, ConsumerDispatcher, InMemoryTransport, ProducerGateway, SchemaRegistryClient,
};
use wiregate_core::Schema;

fn record(id: i32) -> Value {
    Value::Record(vec![
        ("id".to_string(), Value::Int(id)),
        ("is_good".to_string(), Value::Boolean(true)),
        ("created_at".to_string(), Value::Long(1_700_000_000_000)),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Stand-in registry so the demo needs no infrastructure. Point the
    // client at a real registry URL (e.g. http://localhost:8081) instead to
    // run against one.
    let mut registry_stub = mockito::Server::new_async().await;
    registry_stub
        .mock("POST", "/subjects/example-value/versions")
        .with_status(200)
        .with_body(r#"{"id": 1}"#)
        .create_async()
        .await;

    let schema = Schema::from_definition(serde_json::json!({
        "type": "record",
        "name": "example",
        "fields": [
            {"name": "id", "type": "int"},
            {"name": "is_good", "type": "boolean"},
            {"name": "created_at", "type": "long"}
        ]
    }))?;
    registry_stub
        .mock("GET", "/schemas/ids/1")
        .with_status(200)
        .with_body(serde_json::json!({ "schema": schema.definition_json()? }).to_string())
        .create_async()
        .await;

    let registry = Arc::new(SchemaRegistryClient::new(registry_stub.url())?);

    let (transport, events) = InMemoryTransport::new();
    let gateway = Arc::new(
        ProducerGateway::builder()
            .registry(Arc::clone(&registry))
            .transport(Arc::clone(&transport) as Arc<dyn BrokerTransport>)
            .schema(schema)
            .build()
            .await?,
    );
    tokio::spawn(Arc::clone(&gateway).run(events));

    // The transport has not signaled ready yet: these calls queue.
    let mut pending = Vec::new();
    for id in 0..5 {
        pending.push(gateway.produce("example", record(id)).await?);
    }
    tracing::info!(queued = pending.len(), "Produced before readiness");

    transport.signal_ready();
    for result in &mut pending {
        result.wait_outcome().await?;
    }
    tracing::info!("Queued calls drained");

    let dispatcher = ConsumerDispatcher::builder()
        .registry(registry)
        .topic("example")
        .handler(|decoded| tracing::info!(topic = %decoded.topic, value = ?decoded.value, "Consumed"))
        .build()?;

    for (topic, payload) in transport.sent() {
        dispatcher.dispatch(&topic, &payload).await;
    }

    Ok(())
}
