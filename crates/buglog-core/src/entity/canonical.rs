//! Canonical JSON serialization.
//!
//! Compact output, object keys sorted byte-wise at every depth, arrays in
//! their original order. Every content hash in buglog is computed over this
//! form, so the same logical value always hashes to the same id regardless of
//! which replica serialized it or in which order its map was built.

use serde_json::Value;
use std::fmt::Write as _;

/// Render a [`serde_json::Value`] as canonical JSON.
///
/// ```
/// use serde_json::json;
/// use buglog_core::entity::canonical::to_canonical_string;
///
/// let val = json!({"z": 1, "a": {"c": 3, "b": 2}});
/// assert_eq!(to_canonical_string(&val), r#"{"a":{"b":2,"c":3},"z":1}"#);
/// ```
#[must_use]
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::with_capacity(128);
    push_value(&mut out, value);
    out
}

/// Canonical JSON as bytes, ready for hashing.
#[must_use]
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    to_canonical_string(value).into_bytes()
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => push_string(out, s),
        Value::Array(items) => {
            out.push('[');
            let mut first = true;
            for item in items {
                if !first {
                    out.push(',');
                }
                first = false;
                push_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            let mut first = true;
            for (key, val) in entries {
                if !first {
                    out.push(',');
                }
                first = false;
                push_string(out, key);
                out.push(':');
                push_value(out, val);
            }
            out.push('}');
        }
    }
}

/// JSON string escaping per RFC 8259, minimal form.
fn push_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
