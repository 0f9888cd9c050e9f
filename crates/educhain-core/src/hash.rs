//! SHA-256 block digest and the canonical payload encoding it relies on.

use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

/// Hash of a block's fields, hex encoded (64 chars).
///
/// The preimage is `index ++ prior_hash ++ timestamp ++ canonical(data) ++ nonce`
/// with integers written in decimal and no separators.
pub fn digest(index: u64, prior_hash: &str, timestamp: &str, data: &Value, nonce: u64) -> String {
    digest_with_prefix(&preimage_prefix(index, prior_hash, timestamp, data), nonce)
}

/// Everything in the preimage except the nonce. Constant for the whole of a
/// nonce search, so miners build it once.
pub fn preimage_prefix(index: u64, prior_hash: &str, timestamp: &str, data: &Value) -> String {
    format!("{index}{prior_hash}{timestamp}{}", canonical_data(data))
}

pub fn digest_with_prefix(prefix: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical text of a payload.
///
/// Objects and arrays are written the way Python's
/// `json.dumps(value, sort_keys=True)` writes them: `", "` and `": "`
/// separators, keys sorted at every level, non-ASCII escaped as `\uXXXX`,
/// floats in `repr` form. Strings contribute their raw contents, other
/// scalars their JSON text.
pub fn canonical_data(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            let mut out = String::new();
            write_canonical(data, &mut out);
            out
        }
        other => other.to_string(),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ascii_string(key, out);
                out.push_str(": ");
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_ascii_string(s, out),
        Value::Number(n) => match n.as_f64().filter(|_| n.is_f64()) {
            Some(f) => write_float(f, out),
            None => out.push_str(&n.to_string()),
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Quoted string with everything outside printable ASCII escaped, one
/// `\uXXXX` per UTF-16 unit.
fn write_ascii_string(s: &str, out: &mut String) {
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
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

/// Shortest round-trip digits laid out like Python's float `repr`: positional
/// for exponents in `-4..16` (always with a fractional part), otherwise
/// `d.ddde+XX`.
fn write_float(f: f64, out: &mut String) {
    let sci = format!("{f:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    out.push_str(sign);

    if (-4..16).contains(&exp) {
        if exp < 0 {
            out.push_str("0.");
            out.push_str(&"0".repeat((-exp - 1) as usize));
            out.push_str(&digits);
        } else {
            let int_len = exp as usize + 1;
            if digits.len() > int_len {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            } else {
                out.push_str(&digits);
                out.push_str(&"0".repeat(int_len - digits.len()));
                out.push_str(".0");
            }
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let exp_sign = if exp < 0 { '-' } else { '+' };
        out.push_str(&format!("e{exp_sign}{:02}", exp.abs()));
    }
}

/// Number of leading `'0'` hex digits in `hash`.
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// The proof-of-work predicate: at least `difficulty` leading zero digits.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    leading_zero_digits(hash) >= difficulty
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub fn sha512_hex(text: &str) -> String {
    hex::encode(Sha512::digest(text.as_bytes()))
}

/// SHA-256 of `text` with `salt` appended.
pub fn salted_sha256(text: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact comparison against the lowercase hex digest; an uppercase
/// `expected` does not match.
pub fn verify_sha256(text: &str, expected: &str) -> bool {
    sha256_hex(text) == expected
}
