//! Partial-update helpers for partner request structs.
//!
//! A field counts as empty when it serializes to `null` or `""`.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Fields of `obj` that are neither null nor the empty string.
pub fn non_empty_fields<T: Serialize>(obj: &T) -> serde_json::Result<Map<String, Value>> {
    Ok(match serde_json::to_value(obj)? {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !is_empty(v)).collect(),
        _ => Map::new(),
    })
}

/// Fills the empty fields of `dest` from `src`. Fields already set in
/// `dest` win. `T` must deserialize from a partial object, usually via
/// `#[serde(default)]`.
pub fn copy_non_empty<T: Serialize + DeserializeOwned>(src: &T, dest: &mut T) -> serde_json::Result<()> {
    let mut merged = non_empty_fields(dest)?;
    for (key, value) in non_empty_fields(src)? {
        merged.entry(key).or_insert(value);
    }
    *dest = serde_json::from_value(Value::Object(merged))?;
    Ok(())
}

/// Form-encodable pairs from the non-empty fields of `obj`.
pub fn form_fields<T: Serialize>(obj: &T) -> serde_json::Result<Vec<(String, String)>> {
    Ok(non_empty_fields(obj)?
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}

/// Random alphanumeric id of exactly `len` characters.
pub fn unique_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
