// Typed lookups into raw feed JSON.
//
// Every lookup goes through a JSON pointer and returns an Option; call sites
// pick their own default. Numbers that arrive as strings ("8471214") are
// accepted too, since the feed is not consistent about it.

use serde_json::Value;

/// Value at `pointer`, or None if any step of the path is missing.
pub fn at<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    value.pointer(pointer).filter(|v| !v.is_null())
}

pub fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    at(value, pointer).and_then(Value::as_str)
}

pub fn i64_at(value: &Value, pointer: &str) -> Option<i64> {
    match at(value, pointer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn u32_at(value: &Value, pointer: &str) -> Option<u32> {
    i64_at(value, pointer).and_then(|v| u32::try_from(v).ok())
}

pub fn f64_at(value: &Value, pointer: &str) -> Option<f64> {
    match at(value, pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn array_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a Vec<Value>> {
    at(value, pointer).and_then(Value::as_array)
}
