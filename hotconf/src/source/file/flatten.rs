//! Flattening of structured documents into dotted string keys.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::Snapshot;

/// Separator placed between nested table names.
pub(super) const KEY_SEPARATOR: char = '.';

/// Flatten a parsed document into a snapshot.
///
/// Returns `None` when the document root is not a table.
pub(super) fn flatten(document: &JsonValue) -> Option<Snapshot> {
    let JsonValue::Object(root) = document else {
        return None;
    };
    let mut out = BTreeMap::new();
    for (key, value) in root {
        flatten_into(key, value, &mut out);
    }
    Some(Snapshot::from_map(out))
}

fn flatten_into(key: &str, value: &JsonValue, out: &mut BTreeMap<String, String>) {
    match value {
        JsonValue::Object(table) => {
            for (child, nested) in table {
                let joined = format!("{key}{KEY_SEPARATOR}{child}");
                flatten_into(&joined, nested, out);
            }
        }
        other => {
            out.insert(key.to_owned(), render(other));
        }
    }
}

/// Render a leaf value as text.
///
/// Arrays of scalars are comma-joined; arrays holding tables or arrays are
/// rendered as compact JSON so no information is lost.
fn render(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        JsonValue::Bool(flag) => flag.to_string(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::Array(items) if items.iter().all(is_scalar) => {
            items.iter().map(render).collect::<Vec<_>>().join(",")
        }
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

const fn is_scalar(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Array(_) | JsonValue::Object(_))
}
