//! Best-effort schema inference
//!
//! Derives a field list from an untyped JSON map for convenience signing.
//! Fields are sorted by name so the inferred schema (and therefore the
//! digest) is deterministic. Callers needing precise semantics should
//! supply a schema explicitly.

use serde_json::{Map, Value};

use crate::types::Field;

/// Infer an EIP-712 field list from a name → value mapping
///
/// Rules:
/// - booleans → `bool`
/// - integer numbers → `uint256`
/// - strings that look like an address (`0x` + 40 hex digits) → `address`
/// - other `0x` hex strings of at most 32 bytes → `bytesN` (dynamic
///   `bytes` when empty)
/// - unsigned base-10 strings → `uint256`; a leading `-` stays `string`
/// - arrays → element type of the first element plus `[]` (empty arrays
///   fall back to `string[]`)
/// - everything else (floats, null, nested maps) → `string`
pub fn infer_types(message: &Map<String, Value>) -> Vec<Field> {
    let mut fields: Vec<Field> = message
        .iter()
        .map(|(name, value)| Field::new(name.clone(), infer_type(value)))
        .collect();

    fields.sort_by(|a, b| a.name.cmp(&b.name));
    fields
}

fn infer_type(value: &Value) -> String {
    match value {
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) if n.is_u64() || n.is_i64() => "uint256".to_string(),
        Value::String(s) => infer_string_type(s),
        Value::Array(items) => match items.first() {
            Some(first) => format!("{}[]", infer_type(first)),
            None => "string[]".to_string(),
        },
        _ => "string".to_string(),
    }
}

fn infer_string_type(s: &str) -> String {
    if is_hex_address(s) {
        return "address".to_string();
    }

    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if digits.len() % 2 == 0
            && digits.len() <= 64
            && digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return match digits.len() / 2 {
                0 => "bytes".to_string(),
                n => format!("bytes{}", n),
            };
        }
        return "string".to_string();
    }

    // unsigned decimal integers only; "-123" stays a string
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return "uint256".to_string();
    }

    "string".to_string()
}

/// `0x` followed by exactly 40 hex digits, any casing (no checksum check)
fn is_hex_address(s: &str) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(body) => body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
