//! Schema discovery helpers shared by every extractor.
//!
//! The data dumps this crate ingests come from several providers that
//! disagree on field spelling and nesting. Each logical field (item id,
//! display name, amount) has one ordered alias list consulted by one shared
//! resolver, so provider quirks stay isolated here instead of leaking into
//! the extraction logic.

use serde_json::Value;

use crate::constants::MAX_SCAN_DEPTH;

/// Ordered alias list for an item's unique identifier. Attribute-flattened
/// XML dumps prefix attributes with `@`.
pub const ITEM_ID_KEYS: &[&str] = &[
    "@uniquename",
    "@uniqueName",
    "@itemtype",
    "@itemid",
    "@item",
    "UniqueName",
    "uniqueName",
    "ItemType",
    "itemType",
    "itemtype",
    "itemId",
    "item_id",
    "id",
];

/// Direct name fields, tried after the localized-name map.
pub const NAME_KEYS: &[&str] = &["@name", "Name", "name", "localizedName"];

/// Known spellings of the localized-name container.
pub const LOCALIZED_CONTAINER_KEYS: &[&str] =
    &["LocalizedNames", "localizedNames", "localized_names"];

/// Language preference order for localized names.
pub const PREFERRED_LANGUAGES: &[&str] = &["EN-US", "en-US", "EN", "en"];

/// Known container keys an object may use to wrap its entry list.
pub const LIST_CONTAINER_KEYS: &[&str] = &[
    "items", "Items", "data", "Data", "list", "List", "values", "Values",
];

/// First present field among `keys` that is a non-empty string or a finite
/// number (coerced to its string form). Returns `None` when nothing
/// matches.
pub fn string_field<S: AsRef<str>>(node: &Value, keys: &[S]) -> Option<String> {
    let map = node.as_object()?;
    for key in keys {
        match map.get(key.as_ref()) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                return Some(text.trim().to_string());
            }
            Some(Value::Number(num)) if num.as_f64().is_some_and(f64::is_finite) => {
                return Some(num.to_string());
            }
            _ => {}
        }
    }
    None
}

/// First field among `keys` coercible to a finite positive number. Numeric
/// strings count; everything else is skipped.
pub fn number_field<S: AsRef<str>>(node: &Value, keys: &[S]) -> Option<f64> {
    let map = node.as_object()?;
    for key in keys {
        let value = match map.get(key.as_ref()) {
            Some(Value::Number(num)) => num.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(num) = value {
            if num.is_finite() && num > 0.0 {
                return Some(num);
            }
        }
    }
    None
}

/// Resolve an item's unique identifier among the known alternate spellings.
pub fn item_id(node: &Value) -> Option<String> {
    string_field(node, ITEM_ID_KEYS)
}

/// Resolve a human-readable name: localized map first (preferred languages,
/// then any populated value), then direct name fields, then `fallback`.
pub fn localized_name(node: &Value, fallback: &str) -> String {
    let localized = LOCALIZED_CONTAINER_KEYS
        .iter()
        .find_map(|key| node.get(*key).and_then(Value::as_object));

    if let Some(map) = localized {
        for language in PREFERRED_LANGUAGES {
            if let Some(text) = map.get(*language).and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
        for value in map.values() {
            if let Some(text) = value.as_str() {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
    }

    string_field(node, NAME_KEYS).unwrap_or_else(|| fallback.to_string())
}

/// Coerce an arbitrary value into a flat entry list: arrays as-is, objects
/// through a known container key, else the object's values when every one
/// of them is itself object-like, else empty.
pub fn coerce_to_list(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(entries) => entries.iter().collect(),
        Value::Object(map) => {
            for key in LIST_CONTAINER_KEYS {
                if let Some(Value::Array(entries)) = map.get(*key) {
                    return entries.iter().collect();
                }
            }
            let values: Vec<&Value> = map.values().collect();
            if !values.is_empty() && values.iter().all(|v| v.is_object()) {
                values
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Collect every node with a resolvable item id, depth-first. Arrays are
/// flattened; each object is tested itself, then every child value is
/// recursed. Recursion stops past `max_depth`.
pub fn collect_identifiable_entries(node: &Value, max_depth: usize) -> Vec<&Value> {
    let mut out = Vec::new();
    collect_into(node, 0, max_depth, &mut out);
    out
}

/// [`collect_identifiable_entries`] with the default depth bound.
pub fn collect_default(node: &Value) -> Vec<&Value> {
    collect_identifiable_entries(node, MAX_SCAN_DEPTH)
}

fn collect_into<'a>(node: &'a Value, depth: usize, max_depth: usize, out: &mut Vec<&'a Value>) {
    if depth > max_depth {
        return;
    }
    match node {
        Value::Array(entries) => {
            for entry in entries {
                collect_into(entry, depth + 1, max_depth, out);
            }
        }
        Value::Object(map) => {
            if item_id(node).is_some() {
                out.push(node);
            }
            for value in map.values() {
                collect_into(value, depth + 1, max_depth, out);
            }
        }
        _ => {}
    }
}
