//! Text cleanup applied when a store rejects a document's encoding.
//!
//! Offending characters are replaced with U+FFFD, never dropped, so the
//! surrounding content stays intact.

use std::borrow::Cow;

use serde_json::Value;

const REPLACEMENT: char = '\u{FFFD}';

/// Control characters other than tab, newline and carriage return, plus
/// Unicode noncharacters.
fn is_rejected(c: char) -> bool {
    if matches!(c, '\t' | '\n' | '\r') {
        return false;
    }
    let cp = c as u32;
    c.is_control() || (0xFDD0..=0xFDEF).contains(&cp) || (cp & 0xFFFE) == 0xFFFE
}

pub fn sanitize_text(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_rejected) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if is_rejected(c) { REPLACEMENT } else { c })
            .collect(),
    )
}

/// Sanitize every string in `value`, object keys included. Numbers, booleans
/// and nulls are untouched.
///
/// A key whose sanitized form is already taken in the same object keeps its
/// original spelling, so no entry is lost.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Cow::Owned(clean) = sanitize_text(s) {
                *s = clean;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(map) => {
            let (clean, dirty): (Vec<_>, Vec<_>) = std::mem::take(map)
                .into_iter()
                .partition(|(key, _)| !key.chars().any(is_rejected));

            for (key, mut item) in clean {
                sanitize_value(&mut item);
                map.insert(key, item);
            }
            for (key, mut item) in dirty {
                sanitize_value(&mut item);
                let replaced = sanitize_text(&key).into_owned();
                if map.contains_key(&replaced) {
                    map.insert(key, item);
                } else {
                    map.insert(replaced, item);
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Whether `value` holds any string that sanitizing would change.
pub fn needs_sanitizing(value: &Value) -> bool {
    match value {
        Value::String(s) => s.chars().any(is_rejected),
        Value::Array(items) => items.iter().any(needs_sanitizing),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k.chars().any(is_rejected) || needs_sanitizing(v)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}
