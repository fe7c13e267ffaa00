//! Response body parsing. Pure functions over the raw body text.

use serde_json::Value;

use twtsync_core::error::ApiError;
use twtsync_core::types::{PerformanceId, UpstreamRecord};

/// Envelope key of the single-performance response.
pub const PERFORMANCE_ENVELOPE: &str = "performance";
/// Wrapper key of the performance list response.
pub const PERFORMANCES_KEY: &str = "performances";
/// Wrapper key of the arrangement list response.
pub const ARRANGEMENTS_KEY: &str = "arrangements";

fn parse_json(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::ResponseHandling(format!("response is not valid JSON: {e}")))
}

/// A list of records, either a bare array or an object holding the array
/// under `key`. Non-object entries are a shape error.
pub fn parse_record_list(body: &str, key: &str) -> Result<Vec<UpstreamRecord>, ApiError> {
    let value = parse_json(body)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(ApiError::ResponseHandling(format!("'{key}' is not a list")));
            }
            None => {
                return Err(ApiError::ResponseHandling(format!(
                    "response has no '{key}' list"
                )));
            }
        },
        other => {
            return Err(ApiError::ResponseHandling(format!(
                "expected a list of {key}, got {}",
                kind(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(ApiError::ResponseHandling(format!(
                "{key}[{index}] is {}, expected an object",
                kind(&other)
            ))),
        })
        .collect()
}

/// Body of `GET /performances`.
pub fn parse_performance_list(body: &str) -> Result<Vec<UpstreamRecord>, ApiError> {
    parse_record_list(body, PERFORMANCES_KEY)
}

/// Body of `GET /arrangements`.
pub fn parse_arrangement_list(body: &str) -> Result<Vec<UpstreamRecord>, ApiError> {
    parse_record_list(body, ARRANGEMENTS_KEY)
}

/// Body of `GET /performances/{id}`: the record inside the `performance`
/// envelope. A null envelope means the provider does not know the id.
pub fn parse_performance(body: &str, id: &PerformanceId) -> Result<UpstreamRecord, ApiError> {
    match parse_json(body)? {
        Value::Object(mut map) => match map.remove(PERFORMANCE_ENVELOPE) {
            Some(Value::Object(record)) => Ok(record),
            Some(Value::Null) => Err(ApiError::PerformanceNotFound(id.clone())),
            Some(other) => Err(ApiError::ResponseHandling(format!(
                "'{PERFORMANCE_ENVELOPE}' is {}, expected an object",
                kind(&other)
            ))),
            None => Err(ApiError::ResponseHandling(format!(
                "response for performance {id} has no '{PERFORMANCE_ENVELOPE}' envelope"
            ))),
        },
        other => Err(ApiError::ResponseHandling(format!(
            "expected an object, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
