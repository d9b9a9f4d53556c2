//! Tail records as they arrive from the server and as they are displayed.

#![allow(missing_docs)]

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::Value;

/// Placeholder for an absent key or timestamp.
pub const NOT_AVAILABLE: &str = "N/A";

/// Appended to payloads cut at the length limit.
pub const ELLIPSIS: &str = "...";

/// One record from the tail endpoint, decoded leniently.
///
/// Every field except `payload` is optional; a field of the wrong type is
/// treated as absent rather than failing the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub key: Option<String>,
    /// Producer timestamp, epoch milliseconds.
    pub created_at: Option<i64>,
    /// Broker append timestamp, epoch milliseconds.
    pub appended_at: Option<i64>,
    pub payload: String,
}

impl RawMessage {
    /// Decode one array element of the tail response.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self {
                payload: text_of(value),
                ..Self::default()
            };
        };
        Self {
            partition: obj
                .get("partition")
                .and_then(Value::as_i64)
                .and_then(|p| i32::try_from(p).ok()),
            offset: obj.get("offset").and_then(Value::as_i64),
            key: obj.get("key").and_then(optional_text),
            created_at: obj.get("created_at").and_then(epoch_millis),
            appended_at: obj.get("appended_at").and_then(epoch_millis),
            payload: obj.get("payload").map(text_of).unwrap_or_default(),
        }
    }
}

fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// A record ready for rendering. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub key: String,
    pub timestamp_label: String,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl DisplayEntry {
    #[must_use]
    pub fn from_raw(raw: &RawMessage, max_payload_length: usize) -> Self {
        Self {
            key: raw
                .key
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            timestamp_label: timestamp_label(raw.created_at, raw.appended_at),
            payload: truncate_payload(&raw.payload, max_payload_length),
            partition: raw.partition,
            offset: raw.offset,
        }
    }

    /// `p<partition>@<offset>` when both are known.
    #[must_use]
    pub fn position(&self) -> Option<String> {
        match (self.partition, self.offset) {
            (Some(partition), Some(offset)) => Some(format!("p{partition}@{offset}")),
            _ => None,
        }
    }
}

/// `"<ISO-8601> Created"`, else `"<ISO-8601> Appended"`, else `"N/A"`.
///
/// A timestamp outside the representable range counts as absent.
#[must_use]
pub fn timestamp_label(created_at: Option<i64>, appended_at: Option<i64>) -> String {
    if let Some(iso) = created_at.and_then(iso_millis) {
        return format!("{iso} Created");
    }
    if let Some(iso) = appended_at.and_then(iso_millis) {
        return format!("{iso} Appended");
    }
    NOT_AVAILABLE.to_string()
}

fn iso_millis(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Keep at most `max_chars` characters, marking a cut with `...`.
#[must_use]
pub fn truncate_payload(payload: &str, max_chars: usize) -> String {
    match payload.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &payload[..cut]),
        None => payload.to_string(),
    }
}
