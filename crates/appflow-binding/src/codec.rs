//! Conversion between nested data model documents and flat form data.
//!
//! Encoding walks the document and emits one key per scalar leaf:
//! object keys join with `.`, array elements add `[index]` to the segment
//! that holds the array. Every scalar becomes its string form, so the
//! number `0` is stored as `"0"` and `false` as `"false"`.
//!
//! Decoding parses each key into a [`FieldPath`] and rebuilds objects and
//! arrays. [`unflatten`] returns every leaf as a string. [`unflatten_typed`]
//! restores numbers and booleans where the data model schema declares them,
//! which is what the backend receives on save.
//!
//! Array indices above [`MAX_ROW_INDEX`] are refused so a single key cannot
//! allocate an arbitrarily large array.
//!
//! Nulls and empty containers produce no keys. Arrays nested directly in
//! arrays have no flat representation and are skipped with a warning.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::{BindingError, Result};
use crate::path::{FieldPath, Segment};
use crate::schema::DataModelSchema;

/// Flat form data: binding path to string value.
pub type FormData = BTreeMap<String, String>;

/// Flatten a nested document into form data.
pub fn flatten(document: &Value) -> FormData {
    let mut form_data = FormData::new();
    let mut path = FieldPath::default();
    if let Value::Object(object) = document {
        flatten_object(object, &mut path, &mut form_data);
    }
    form_data
}

fn flatten_object(object: &Map<String, Value>, path: &mut FieldPath, out: &mut FormData) {
    for (key, value) in object {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let element = path.child(Segment::indexed(key.clone(), index));
                    flatten_value(item, element, out);
                }
            }
            other => flatten_value(other, path.child(Segment::field(key.clone())), out),
        }
    }
}

fn flatten_value(value: &Value, mut path: FieldPath, out: &mut FormData) {
    match value {
        Value::Null => {}
        Value::Object(object) => flatten_object(object, &mut path, out),
        Value::Array(_) => {
            tracing::warn!(path = %path, "skipping array nested directly in array");
        }
        Value::String(text) => {
            out.insert(path.to_string(), text.clone());
        }
        Value::Bool(flag) => {
            out.insert(path.to_string(), flag.to_string());
        }
        Value::Number(number) => {
            out.insert(path.to_string(), number.to_string());
        }
    }
}

/// Highest array index a decoded key may use.
pub const MAX_ROW_INDEX: usize = 9_999;

/// Rebuild a nested document from form data.
///
/// Keys that do not parse are skipped with a warning. Gaps in array
/// indices are filled with `null`.
pub fn unflatten(form_data: &FormData) -> Value {
    decode(form_data, |_, value| Value::String(value.to_string()))
}

/// Rebuild a nested document, typing leaves from the data model schema.
///
/// Fields declared `integer`, `number` or `boolean` are decoded to JSON
/// numbers and booleans. An empty value for such a field becomes `null`.
/// Values that do not parse as their declared type, and fields the schema
/// does not know, stay strings.
pub fn unflatten_typed(form_data: &FormData, schema: &DataModelSchema) -> Value {
    decode(form_data, |key, value| typed_leaf(schema.scalar_type(key), value))
}

fn decode(form_data: &FormData, leaf: impl Fn(&str, &str) -> Value) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in form_data {
        let inserted = FieldPath::parse(key).and_then(|path| insert(&mut root, &path, leaf(key, value)));
        if let Err(error) = inserted {
            tracing::warn!(%error, "skipping form data key");
        }
    }
    root
}

fn typed_leaf(kind: Option<&str>, value: &str) -> Value {
    let text = || Value::String(value.to_string());
    match kind {
        Some("integer" | "number" | "boolean") if value.is_empty() => Value::Null,
        Some("integer") => parse_integer(value).unwrap_or_else(text),
        Some("number") => parse_integer(value)
            .or_else(|| {
                value
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(text),
        Some("boolean") => match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => text(),
        },
        _ => text(),
    }
}

fn parse_integer(value: &str) -> Option<Value> {
    if let Ok(signed) = value.parse::<i64>() {
        return Some(Value::from(signed));
    }
    value.parse::<u64>().ok().map(Value::from)
}

/// Write `value` at `path` inside `root`, creating containers on the way.
///
/// Fails without touching `root` when an index exceeds [`MAX_ROW_INDEX`].
pub fn insert(root: &mut Value, path: &FieldPath, value: Value) -> Result<()> {
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };
    if segments
        .iter()
        .any(|segment| segment.index.is_some_and(|index| index > MAX_ROW_INDEX))
    {
        return Err(BindingError::InvalidPath {
            path: path.to_string(),
            reason: "array index too large",
        });
    }

    let mut node = root;
    for segment in parents {
        node = descend(node, segment);
    }
    *descend(node, last) = value;
    Ok(())
}

fn descend<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(object) = node else {
        unreachable!("node was just made an object");
    };
    let entry = object.entry(segment.field.clone()).or_insert(Value::Null);

    let Some(index) = segment.index else {
        return entry;
    };
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    let Value::Array(items) = entry else {
        unreachable!("entry was just made an array");
    };
    if items.len() <= index {
        items.resize(index + 1, Value::Null);
    }
    &mut items[index]
}

/// Read the value at `path` from a nested document.
pub fn lookup<'a>(document: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut node = document;
    for segment in path.segments() {
        node = node.get(&segment.field)?;
        if let Some(index) = segment.index {
            node = node.get(index)?;
        }
    }
    Some(node)
}
