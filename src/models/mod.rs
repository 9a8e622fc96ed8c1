pub mod ad;
pub mod page;

pub use ad::Ad;
pub use page::Page;

use serde_json::Value;

/// Reads the first present key as a string, accepting numeric ids.
pub(crate) fn string_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match entry.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads the first present key as an integer, accepting floats and numeric strings.
pub(crate) fn int_field(entry: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match entry.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(value: f64) -> i64 {
    value as i64
}
