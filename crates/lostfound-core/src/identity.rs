//! Identity extraction.
//!
//! Sources disagree on the id field name (`id` vs `_id`) and on its type.
//! Decoding folds both into [`Item::id`]; everything that compares items
//! goes through [`identity_of`] and never looks at raw field names.

use serde_json::{Map, Value};

use crate::model::Item;

/// The comparison key of an item, or `None` if it has no usable identity.
#[must_use]
pub fn identity_of(item: &Item) -> Option<&str> {
    item.id.as_deref().and_then(clean)
}

/// `true` when both items carry the same identity.
///
/// Items without identity are never equal to anything, themselves included.
#[must_use]
pub fn same_identity(a: &Item, b: &Item) -> bool {
    matches!((identity_of(a), identity_of(b)), (Some(x), Some(y)) if x == y)
}

/// Identity from an undecoded JSON object, `id` preferred over `_id`.
#[must_use]
pub fn raw_identity(map: &Map<String, Value>) -> Option<String> {
    ["id", "_id"].iter().find_map(|key| match map.get(*key) {
        Some(Value::String(text)) => clean(text).map(str::to_string),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Blank ids count as missing.
pub(crate) fn clean(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
