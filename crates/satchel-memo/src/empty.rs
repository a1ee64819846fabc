//! Falsy-value test used to decide whether a computed result is stored.

use serde_json::Value;

/// Whether a value counts as empty.
///
/// Empty means null, `false`, numeric zero, `""`, `[]` or `{}`. Structs
/// serialise to objects, so a struct with no fields (or one flattened to
/// nothing) is empty too.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
