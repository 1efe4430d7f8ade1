//! FILENAME: core/rollup-engine/src/validate.rs
//! Predicates over raw input values.
//!
//! Every predicate is total: it accepts any JSON shape, including a missing
//! field (`None`), and never fails. Callers decide whether a `false` skips
//! the item or aborts the call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}$").expect("month pattern is valid"));

static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("decimal pattern is valid")
});

pub fn is_valid_term(value: Option<&Value>) -> bool {
    is_non_empty_string(value)
}

pub fn is_valid_stream(value: Option<&Value>) -> bool {
    is_non_empty_string(value)
}

/// An array with at least one element.
pub fn is_valid_detailed(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(items)) if !items.is_empty())
}

/// `YYYY-MM`: four digits, a dash, two digits.
pub fn is_valid_month(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if MONTH_RE.is_match(s))
}

/// True when the value coerces to a number other than NaN.
pub fn is_valid_value(value: Option<&Value>) -> bool {
    !coerce_number(value).is_nan()
}

fn is_non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}

// ============================================================================
// NUMERIC COERCION
// ============================================================================

/// Coerces a loosely typed value to `f64`.
///
/// Missing → NaN, null → 0, booleans → 0/1, numbers as-is. Strings are
/// trimmed; empty text is 0, decimal, `Infinity` and `0x`/`0o`/`0b` literals
/// parse, anything else is NaN. Arrays and objects are NaN.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => coerce_text(s),
        Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn coerce_text(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    if let Some(radix_value) = parse_prefixed_integer(text) {
        return radix_value;
    }

    if DECIMAL_RE.is_match(text) {
        text.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// `0x`, `0o` and `0b` literals (unsigned only).
fn parse_prefixed_integer(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'0' {
        return None;
    }
    let radix = match bytes[1] {
        b'x' | b'X' => 16,
        b'o' | b'O' => 8,
        b'b' | b'B' => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Some(f64::NAN);
    }
    match u128::from_str_radix(digits, radix) {
        Ok(n) => Some(n as f64),
        Err(_) => Some(f64::NAN),
    }
}
