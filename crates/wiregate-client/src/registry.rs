//! HTTP client for Schema Registry
//!
//! Registers schemas with a remote registry and resolves schema identifiers
//! back to decoders, keeping an in-process `schema_id → decoder` cache so a
//! consumer fetches each schema over HTTP at most once in the common case.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use wiregate_core::{AvroCodec, Schema};

use crate::error::{ClientError, Result};

/// Content type mandated by the registry's v1 REST protocol.
const CONTENT_TYPE_V1: &str = "application/vnd.schemaregistry.v1+json";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Schema registration request: the definition body, JSON-encoded into a
/// string per the registry contract.
#[derive(Debug, Serialize)]
struct RegisterSchemaRequest {
    schema: String,
}

/// Schema registration response
#[derive(Debug, Deserialize)]
struct RegisterSchemaResponse {
    id: u32,
}

/// Response for `GET /schemas/ids/{id}`
#[derive(Debug, Deserialize)]
struct GetSchemaResponse {
    schema: String,
}

/// HTTP client for schema registry operations.
///
/// The decoder cache is owned here and mutated only here. It is insert-only
/// and never evicted: registry schemas are append-only by contract, so a
/// cached decoder can never go stale. Concurrent resolves for the same
/// unseen id are each allowed to fetch; decoders for one id are
/// interchangeable, so whichever insert lands is kept.
pub struct SchemaRegistryClient {
    base_url: String,
    http_client: reqwest::Client,
    decoders: RwLock<HashMap<u32, Arc<AvroCodec>>>,
}

impl SchemaRegistryClient {
    /// Create a client for the registry at `base_url`
    /// (e.g. "http://localhost:8081") with the default 10 s request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ClientError::ConfigError(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            decoders: RwLock::new(HashMap::new()),
        })
    }

    /// Register `schema` under `subject` and return the registry-assigned id.
    ///
    /// The HTTP path uses the `<subject>-value` naming convention. A
    /// duplicate registration that comes back as a conflict but still
    /// carries a usable `{id}` is treated as success, since the registry
    /// guarantees the id is stable for an identical definition. Any other
    /// non-success response is an error whose diagnostic preserves the
    /// status and body verbatim.
    pub async fn register(&self, subject: &str, schema: &Schema) -> Result<u32> {
        let url = format!("{}/subjects/{}-value/versions", self.base_url, subject);
        let request = RegisterSchemaRequest {
            schema: schema.definition_json()?,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            ClientError::SchemaRegistryError(format!("failed to encode registration request: {e}"))
        })?;

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_V1)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                ClientError::SchemaRegistryError(format!("failed to register schema: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            if let Ok(parsed) = serde_json::from_str::<RegisterSchemaResponse>(&body) {
                tracing::debug!(
                    schema_id = parsed.id,
                    subject = subject,
                    conflict = status == reqwest::StatusCode::CONFLICT,
                    "Schema registered"
                );
                return Ok(parsed.id);
            }
            if status.is_success() {
                return Err(ClientError::SchemaRegistryError(format!(
                    "registration response carried no id: {body}"
                )));
            }
        }

        Err(ClientError::SchemaRegistryError(format!(
            "schema registration failed with status {status}: {body}"
        )))
    }

    /// Resolve a schema id to its decoder, cache-first.
    ///
    /// A cached id returns with no network call; otherwise the definition is
    /// fetched from `GET /schemas/ids/{id}`, parsed, inserted into the cache
    /// and returned.
    pub async fn resolve(&self, schema_id: u32) -> Result<Arc<AvroCodec>> {
        {
            let cache = self.decoders.read().await;
            if let Some(codec) = cache.get(&schema_id) {
                tracing::debug!(schema_id, "Schema resolved from cache");
                return Ok(Arc::clone(codec));
            }
        }

        tracing::debug!(schema_id, url = %self.base_url, "Fetching schema from registry");
        let url = format!("{}/schemas/ids/{}", self.base_url, schema_id);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            ClientError::SchemaLookupFailed {
                schema_id,
                reason: format!("failed to fetch schema: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::SchemaLookupFailed {
                schema_id,
                reason: format!("status {status}: {body}"),
            });
        }

        let parsed: GetSchemaResponse =
            response
                .json()
                .await
                .map_err(|e| ClientError::SchemaLookupFailed {
                    schema_id,
                    reason: format!("invalid response body: {e}"),
                })?;

        let codec = Arc::new(AvroCodec::parse_str(&parsed.schema).map_err(|e| {
            ClientError::SchemaLookupFailed {
                schema_id,
                reason: e.to_string(),
            }
        })?);

        let mut cache = self.decoders.write().await;
        let codec = Arc::clone(cache.entry(schema_id).or_insert(codec));
        Ok(codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example_schema() -> Schema {
        Schema::new(
            "example",
            json!({
                "type": "record",
                "name": "example",
                "fields": [
                    {"name": "id", "type": "int"},
                    {"name": "is_good", "type": "boolean"},
                    {"name": "created_at", "type": "long"}
                ]
            }),
        )
    }

    fn schema_body() -> String {
        // Body of GET /schemas/ids/{id}: the definition JSON-encoded into a
        // string field.
        json!({ "schema": example_schema().definition_json().unwrap() }).to_string()
    }

    #[tokio::test]
    async fn register_returns_assigned_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/subjects/example-value/versions")
            .match_header("content-type", CONTENT_TYPE_V1)
            .with_status(200)
            .with_body(r#"{"id": 7}"#)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();
        let id = client.register("example", &example_schema()).await.unwrap();

        assert_eq!(id, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn register_conflict_with_id_equals_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/subjects/example-value/versions")
            .with_status(409)
            .with_body(r#"{"id": 7}"#)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();
        let id = client.register("example", &example_schema()).await.unwrap();

        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn register_failure_preserves_diagnostic() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/subjects/example-value/versions")
            .with_status(422)
            .with_body(r#"{"error_code": 42201, "message": "Invalid schema"}"#)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();
        let err = client
            .register("example", &example_schema())
            .await
            .unwrap_err();

        let diagnostic = err.to_string();
        assert!(diagnostic.contains("422"), "missing status: {diagnostic}");
        assert!(
            diagnostic.contains("Invalid schema"),
            "missing body: {diagnostic}"
        );
    }

    #[tokio::test]
    async fn resolve_fetches_once_then_hits_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/schemas/ids/7")
            .with_status(200)
            .with_body(schema_body())
            .expect(1)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();

        let first = client.resolve(7).await.unwrap();
        let second = client.resolve(7).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn resolve_unknown_id_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/schemas/ids/404")
            .with_status(404)
            .with_body(r#"{"error_code": 40403, "message": "Schema not found"}"#)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();
        let err = client.resolve(404).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::SchemaLookupFailed { schema_id: 404, .. }
        ));
    }

    #[tokio::test]
    async fn resolve_rejects_unparseable_definition() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/schemas/ids/8")
            .with_status(200)
            .with_body(r#"{"schema": "{\"type\": \"no-such-type\"}"}"#)
            .create_async()
            .await;

        let client = SchemaRegistryClient::new(server.url()).unwrap();
        let err = client.resolve(8).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::SchemaLookupFailed { schema_id: 8, .. }
        ));
    }
}
