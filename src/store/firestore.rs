//! Firestore REST backend
//!
//! Reads documents through the v1 REST API and flattens Firestore's typed
//! value encoding into plain JSON.

use crate::store::traits::DocumentStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use safewalk_shared::model::Fields;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Connection settings for the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// API origin, e.g. `https://firestore.googleapis.com`
    pub base_url: String,
    pub project_id: String,
    /// OAuth2 bearer token with datastore read scope
    pub access_token: String,
}

pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: Url,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        let documents_url = Url::parse(&format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            config.base_url.trim_end_matches('/'),
            config.project_id
        ))
        .context("invalid Firestore base URL")?;

        Ok(Self {
            http: reqwest::Client::new(),
            documents_url,
            access_token: config.access_token,
        })
    }

    /// URL of `collection/id`, with each segment percent-encoded
    ///
    /// An empty segment would address the collection instead of a document.
    fn document_url(&self, collection: &str, id: &str) -> Result<Url> {
        if collection.is_empty() || id.is_empty() {
            return Err(anyhow!(
                "empty document path segment in {:?}/{:?}",
                collection,
                id
            ));
        }
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Firestore base URL cannot carry a path"))?
            .push(collection)
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>> {
        let url = self.document_url(collection, id)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("reading {}/{}", collection, id))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: FirestoreDocument = response
                    .json()
                    .await
                    .with_context(|| format!("decoding {}/{}", collection, id))?;
                Ok(Some(decode_fields(&document.fields)))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!(
                    "Firestore read {}/{} failed with {}: {}",
                    collection,
                    id,
                    status,
                    body.trim()
                ))
            }
        }
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

/// Flatten a Firestore `fields` map into plain JSON
pub fn decode_fields(fields: &Map<String, Value>) -> Fields {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Flatten one typed Firestore value
///
/// `integerValue` arrives as a decimal string and becomes a JSON number.
/// Timestamps, references and bytes stay as their string forms.
pub fn decode_value(value: &Value) -> Value {
    let Some(typed) = value.as_object() else {
        return value.clone();
    };
    let Some((kind, inner)) = typed.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "stringValue" | "booleanValue" | "doubleValue" | "timestampValue"
        | "referenceValue" | "bytesValue" | "geoPointValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| Value::Number(Number::from(i)))
                .unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "arrayValue" => {
            let values: Vec<Value> = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default();
            Value::Object(fields)
        }
        _ => inner.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_http;
    use serde_json::json;

    #[test]
    fn test_decode_emergency_document() {
        let raw = json!({
            "userId": {"stringValue": "u1"},
            "status": {"stringValue": "active"},
            "lat": {"doubleValue": 19.4},
            "lng": {"integerValue": "-99"},
            "notifiedContactIds": {"arrayValue": {"values": [
                {"stringValue": "c1"},
                {"stringValue": "c2"}
            ]}},
            "createdAt": {"timestampValue": "2024-05-01T10:00:00Z"},
            "resolvedAt": {"nullValue": null},
            "meta": {"mapValue": {"fields": {"battery": {"integerValue": "42"}}}}
        });

        let decoded = decode_fields(raw.as_object().expect("object"));
        assert_eq!(
            Value::Object(decoded),
            json!({
                "userId": "u1",
                "status": "active",
                "lat": 19.4,
                "lng": -99,
                "notifiedContactIds": ["c1", "c2"],
                "createdAt": "2024-05-01T10:00:00Z",
                "resolvedAt": null,
                "meta": {"battery": 42}
            })
        );
    }

    #[test]
    fn test_decode_empty_containers() {
        assert_eq!(decode_value(&json!({"arrayValue": {}})), json!([]));
        assert_eq!(decode_value(&json!({"mapValue": {}})), json!({}));
    }

    #[test]
    fn test_document_url_encodes_segments() {
        let store = FirestoreStore::new(FirestoreConfig {
            base_url: "https://firestore.googleapis.com/".into(),
            project_id: "safewalk".into(),
            access_token: "token".into(),
        })
        .expect("valid config");

        let url = store.document_url("users", "a b").expect("url");
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/safewalk/databases/(default)/documents/users/a%20b"
        );
    }

    #[test]
    fn test_document_url_rejects_empty_segments() {
        let store = FirestoreStore::new(FirestoreConfig {
            base_url: "https://firestore.googleapis.com".into(),
            project_id: "safewalk".into(),
            access_token: "token".into(),
        })
        .expect("valid config");

        assert!(store.document_url("users", "").is_err());
        assert!(store.document_url("", "u1").is_err());
    }

    fn stub_store(base_url: String) -> FirestoreStore {
        FirestoreStore::new(FirestoreConfig {
            base_url,
            project_id: "safewalk".into(),
            access_token: "secret".into(),
        })
        .expect("valid config")
    }

    async fn firestore_stub() -> String {
        serve_http(|request| {
            assert_eq!(request.method, "GET");
            assert_eq!(request.authorization.as_deref(), Some("Bearer secret"));
            let document = request.path.rsplit('/').next().unwrap_or_default();
            match document {
                "u1" => (
                    200,
                    json!({
                        "name": "projects/safewalk/databases/(default)/documents/users/u1",
                        "fields": {
                            "name": {"stringValue": "Ana"},
                            "fcmToken": {"stringValue": "tokU1"}
                        }
                    })
                    .to_string(),
                ),
                "broken" => (
                    500,
                    json!({"error": {"code": 500, "status": "INTERNAL"}}).to_string(),
                ),
                _ => (
                    404,
                    json!({"error": {"code": 404, "status": "NOT_FOUND"}}).to_string(),
                ),
            }
        })
        .await
    }

    #[tokio::test]
    async fn test_get_decodes_existing_document() {
        let store = stub_store(firestore_stub().await);

        let fields = store.get("users", "u1").await.expect("read").expect("exists");
        assert_eq!(
            Value::Object(fields),
            json!({"name": "Ana", "fcmToken": "tokU1"})
        );
    }

    #[tokio::test]
    async fn test_get_not_found_is_absent() {
        let store = stub_store(firestore_stub().await);

        assert_eq!(store.get("users", "ghost").await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_get_server_error_is_an_error() {
        let store = stub_store(firestore_stub().await);

        let err = store.get("users", "broken").await.expect_err("500");
        assert!(err.to_string().contains("500"), "error: {}", err);
    }

    #[tokio::test]
    async fn test_get_empty_id_never_reaches_the_server() {
        let store = stub_store(firestore_stub().await);

        assert!(store.get("users", "").await.is_err());
    }
}
