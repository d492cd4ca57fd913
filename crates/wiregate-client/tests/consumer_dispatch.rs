//! Consumer Dispatcher Integration Tests
//!
//! Covers the per-message pipeline (envelope → resolve → decode → handler),
//! the cache-first resolution behavior, and the rule that a bad message
//! never kills the dispatch loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use apache_avro::types::Value;
use wiregate_client::{
    ClientError, ConsumerDispatcher, DecodedRecord, InMemoryTransport, SchemaRegistryClient,
};
use wiregate_core::{envelope, AvroCodec, Schema};

const EXAMPLE_DEFINITION: &str = r#"{
    "type": "record",
    "name": "example",
    "fields": [
        {"name": "id", "type": "int"},
        {"name": "is_good", "type": "boolean"},
        {"name": "created_at", "type": "long"}
    ]
}"#;

fn example_record(id: i32) -> Value {
    Value::Record(vec![
        ("id".to_string(), Value::Int(id)),
        ("is_good".to_string(), Value::Boolean(true)),
        ("created_at".to_string(), Value::Long(1_700_000_000_000)),
    ])
}

fn framed_record(schema_id: u32, id: i32) -> bytes::Bytes {
    let codec = AvroCodec::parse_str(EXAMPLE_DEFINITION).unwrap();
    envelope::encode_value(schema_id, &example_record(id), &codec, 1024).unwrap()
}

fn schema_body() -> String {
    let schema =
        Schema::from_definition(serde_json::from_str(EXAMPLE_DEFINITION).unwrap()).unwrap();
    serde_json::json!({ "schema": schema.definition_json().unwrap() }).to_string()
}

struct Harness {
    dispatcher: Arc<ConsumerDispatcher>,
    records: Arc<Mutex<Vec<DecodedRecord>>>,
    errors: Arc<Mutex<Vec<ClientError>>>,
}

fn harness(registry_url: &str) -> Harness {
    let records = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let record_sink = Arc::clone(&records);
    let error_sink = Arc::clone(&errors);
    let dispatcher = Arc::new(
        ConsumerDispatcher::builder()
            .registry(Arc::new(SchemaRegistryClient::new(registry_url).unwrap()))
            .topic("example")
            .handler(move |record| record_sink.lock().unwrap().push(record))
            .on_error(move |err| error_sink.lock().unwrap().push(err))
            .build()
            .unwrap(),
    );

    Harness {
        dispatcher,
        records,
        errors,
    }
}

#[tokio::test]
async fn dispatch_decodes_and_invokes_handler_once() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/schemas/ids/42")
        .with_status(200)
        .with_body(schema_body())
        .create_async()
        .await;

    let h = harness(&server.url());
    h.dispatcher.dispatch("example", &framed_record(42, 9)).await;

    let records = h.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "example");
    assert_eq!(records[0].schema_id, 42);
    assert_eq!(records[0].value, example_record(9));
    assert!(h.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_schema_ids_fetch_at_most_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/schemas/ids/42")
        .with_status(200)
        .with_body(schema_body())
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url());
    h.dispatcher.dispatch("example", &framed_record(42, 1)).await;
    h.dispatcher.dispatch("example", &framed_record(42, 2)).await;

    assert_eq!(h.records.lock().unwrap().len(), 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_envelope_is_dropped_and_loop_survives() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/schemas/ids/42")
        .with_status(200)
        .with_body(schema_body())
        .create_async()
        .await;

    let h = harness(&server.url());

    // Wrong sentinel byte: dropped regardless of the remaining bytes.
    h.dispatcher
        .dispatch("example", &[0x01, 0x00, 0x00, 0x00, 0x2A, 0x02])
        .await;
    // Too short to carry a schema id.
    h.dispatcher.dispatch("example", &[0x00, 0x01]).await;

    {
        let errors = h.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ClientError::Wire(wiregate_core::WireError::MalformedEnvelope(_)))));
        assert!(h.records.lock().unwrap().is_empty());
    }

    // A valid message afterwards still goes through.
    h.dispatcher.dispatch("example", &framed_record(42, 3)).await;
    assert_eq!(h.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn lookup_failure_drops_the_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/schemas/ids/9")
        .with_status(404)
        .with_body(r#"{"error_code": 40403, "message": "Schema not found"}"#)
        .create_async()
        .await;

    let h = harness(&server.url());
    h.dispatcher
        .dispatch("example", &envelope::encode(9, &[0x02]))
        .await;

    let errors = h.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        ClientError::SchemaLookupFailed { schema_id: 9, .. }
    ));
    assert!(h.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn payload_decode_failure_drops_the_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/schemas/ids/42")
        .with_status(200)
        .with_body(schema_body())
        .create_async()
        .await;

    let h = harness(&server.url());

    // 0xFF is a truncated varint; the Avro decoder cannot finish the record.
    h.dispatcher
        .dispatch("example", &envelope::encode(42, &[0xFF]))
        .await;

    assert_eq!(h.errors.lock().unwrap().len(), 1);
    assert!(h.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_preserves_delivery_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/schemas/ids/42")
        .with_status(200)
        .with_body(schema_body())
        .create_async()
        .await;

    let h = harness(&server.url());
    let (transport, events) = InMemoryTransport::new();

    for id in 0..5 {
        transport.inject_message("example", framed_record(42, id));
    }
    tokio::spawn(Arc::clone(&h.dispatcher).run(events));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while h.records.lock().unwrap().len() < 5 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "dispatcher did not drain inbound messages in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let records = h.records.lock().unwrap();
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.value, example_record(i as i32), "handler order must match delivery order");
    }
}

#[test]
fn empty_topic_list_is_a_config_error() {
    let registry = Arc::new(SchemaRegistryClient::new("http://localhost:8081").unwrap());
    let result = ConsumerDispatcher::builder()
        .registry(registry)
        .handler(|_| {})
        .build();
    assert!(matches!(result, Err(ClientError::ConfigError(_))));
}
