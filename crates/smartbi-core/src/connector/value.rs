//! Driver values to JSON primitives.
//!
//! Every backend funnels its rows through [`to_sample_row`]; the per-backend
//! modules only decide which Rust type to decode each column as.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sqlx::{Column, Row, TypeInfo};

use crate::sample::SampleRow;

/// Convert a row, asking `convert` for each cell given its index and the
/// driver's type name. Repeated column names get a numeric suffix so no
/// cell is lost.
pub(crate) fn to_sample_row<R, F>(row: &R, mut convert: F) -> SampleRow
where
    R: Row,
    F: FnMut(&R, usize, &str) -> Value,
{
    let mut out = SampleRow::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = convert(row, i, column.type_info().name());
        let key = unique_key(column.name(), |k| out.contains_key(k));
        out.insert(key, value);
    }
    out
}

/// Column names of a row, in order, suffixed the same way as the keys
/// [`to_sample_row`] produces.
pub(crate) fn column_names<R: Row>(row: &R) -> Vec<String> {
    unique_names(row.columns().iter().map(|c| c.name()))
}

/// Suffix repeated names (`name`, `name_2`, ...) so every column keeps
/// its own key.
pub(crate) fn unique_names<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw {
        let name = unique_key(name, |k| names.iter().any(|n| n == k));
        names.push(name);
    }
    names
}

fn unique_key(name: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Map a decode result to JSON, treating SQL NULL and decode failures
/// alike as `null`.
pub(crate) fn opt<T>(decoded: Result<Option<T>, sqlx::Error>, f: impl FnOnce(T) -> Value) -> Value {
    match decoded {
        Ok(Some(v)) => f(v),
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!("value decode failed: {}", e);
            Value::Null
        }
    }
}

/// Finite floats become numbers, NaN and infinities become null.
pub(crate) fn float(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn binary(bytes: Vec<u8>) -> Value {
    Value::String(STANDARD.encode(bytes))
}

/// Bytes of unknown meaning: text when they are valid UTF-8, base64 when not.
pub(crate) fn text_or_binary(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::String(s),
        Err(e) => binary(e.into_bytes()),
    }
}

/// JSON documents are carried as their compact text.
pub(crate) fn json_text(v: Value) -> Value {
    Value::String(v.to_string())
}

pub(crate) fn display<T: ToString>(v: T) -> Value {
    Value::String(v.to_string())
}
