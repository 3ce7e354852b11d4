//! Response envelope handling.
//!
//! Backends answer either with the payload itself or with an object whose
//! `data` field carries it. List payloads may additionally nest the array
//! under `items`.

use serde_json::Value;

use crate::model::Item;
use crate::remote::RemoteError;

/// Strip a `{ "data": ... }` envelope if present.
#[must_use]
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a list response.
///
/// Accepts `[...]`, `{ "data": [...] }`, `{ "items": [...] }` and
/// `{ "data": { "items": [...] } }`. Non-object elements are skipped;
/// objects are always kept (see [`Item::from_value_lossy`]).
///
/// # Errors
///
/// [`RemoteError::Decode`] when no array can be found.
pub fn decode_list(value: Value) -> Result<Vec<Item>, RemoteError> {
    let payload = match unwrap_data(value) {
        Value::Object(mut map) if map.contains_key("items") => {
            map.remove("items").unwrap_or(Value::Null)
        }
        other => other,
    };

    let Value::Array(elements) = payload else {
        return Err(RemoteError::Decode("expected an item array".to_string()));
    };

    let total = elements.len();
    let items: Vec<Item> = elements.into_iter().filter_map(Item::from_value_lossy).collect();
    if items.len() < total {
        tracing::warn!(skipped = total - items.len(), "ignored non-object list entries");
    }
    Ok(items)
}

/// Decode a single-item response, if it contains one.
#[must_use]
pub fn decode_one(value: Value) -> Option<Item> {
    match unwrap_data(value) {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("item") => {
            map.remove("item").and_then(Item::from_value_lossy)
        }
        other => Item::from_value_lossy(other),
    }
}
