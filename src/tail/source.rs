//! Where tail batches come from.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::api::client::DashboardClient;
use crate::core::errors::{Result, TtvError};

use super::entry::RawMessage;

/// Identity of a tail: cluster, topic and the server-side read position id.
///
/// The id is opaque to the client. The server keeps one consumer per id, so
/// reusing it after a pause resumes where the previous fetch stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TailCursor {
    pub cluster_id: String,
    pub topic: String,
    pub id: u64,
}

impl TailCursor {
    #[must_use]
    pub fn new(cluster_id: impl Into<String>, topic: impl Into<String>, id: u64) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            topic: topic.into(),
            id,
        }
    }

    /// Fresh cursor with a random id.
    #[must_use]
    pub fn random(cluster_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::new(cluster_id, topic, rand::random::<u64>())
    }
}

impl fmt::Display for TailCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.cluster_id, self.topic, self.id)
    }
}

/// One fetch per call; never retries internally.
pub trait TailSource {
    /// Messages that arrived since the previous fetch with this cursor, in
    /// arrival order.
    fn fetch(&mut self, cursor: &TailCursor) -> Result<Vec<RawMessage>>;
}

impl<S: TailSource + ?Sized> TailSource for Box<S> {
    fn fetch(&mut self, cursor: &TailCursor) -> Result<Vec<RawMessage>> {
        (**self).fetch(cursor)
    }
}

/// `GET {base}/api/tailer/{cluster}/{topic}/{id}` against the dashboard server.
#[derive(Debug, Clone)]
pub struct HttpTailSource {
    client: DashboardClient,
}

impl HttpTailSource {
    #[must_use]
    pub const fn new(client: DashboardClient) -> Self {
        Self { client }
    }
}

impl TailSource for HttpTailSource {
    fn fetch(&mut self, cursor: &TailCursor) -> Result<Vec<RawMessage>> {
        let id = cursor.id.to_string();
        let url = self.client.endpoint(&[
            "api",
            "tailer",
            &cursor.cluster_id,
            &cursor.topic,
            &id,
        ])?;
        let endpoint = url.to_string();
        let body = self.client.get_json(url)?;
        decode_batch(&endpoint, &body)
    }
}

/// A tail response must be a JSON array; individual records decode leniently.
pub fn decode_batch(endpoint: &str, body: &Value) -> Result<Vec<RawMessage>> {
    let Value::Array(records) = body else {
        return Err(TtvError::MalformedPayload {
            endpoint: endpoint.to_string(),
            details: format!("expected a JSON array, got {}", kind_of(body)),
        });
    };
    Ok(records.iter().map(RawMessage::from_value).collect())
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_batch_keeps_order() {
        let body = json!([
            {"key": "a", "payload": "1"},
            {"key": "b", "payload": "2"},
            {"payload": "3"}
        ]);
        let batch = decode_batch("http://x/api/tailer/c/t/1", &body).unwrap();
        let payloads: Vec<&str> = batch.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["1", "2", "3"]);
        assert_eq!(batch[2].key, None);
    }

    #[test]
    fn decode_batch_rejects_non_array() {
        let err = decode_batch("http://x", &json!({"error": "no such topic"})).unwrap_err();
        assert_eq!(err.code(), "TTV-2002");
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn empty_array_is_empty_batch() {
        assert!(decode_batch("http://x", &json!([])).unwrap().is_empty());
    }

    #[test]
    fn cursor_display_and_random() {
        let cursor = TailCursor::new("prod", "orders", 7);
        assert_eq!(cursor.to_string(), "prod/orders#7");
        let a = TailCursor::random("prod", "orders");
        assert_eq!(a.cluster_id, "prod");
        assert_eq!(a.topic, "orders");
    }
}
