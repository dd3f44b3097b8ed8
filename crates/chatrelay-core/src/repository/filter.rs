//! Equality filters over stored documents.
//!
//! Keys use `__` as the nesting separator, so `request__channel` addresses
//! `request.channel`. Filters are a conjunction; an empty set matches every
//! document.

use serde_json::Value;

/// A conjunction of `field == value` conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    conditions: Vec<(String, Value)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Filters::new().eq("id", id)`.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq("id", id.into())
    }

    /// Add a `key == value` condition.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions as (path segments, expected value).
    pub fn conditions(&self) -> impl Iterator<Item = (Vec<&str>, &Value)> {
        self.conditions
            .iter()
            .map(|(key, value)| (key.split("__").collect(), value))
    }

    /// Render as a document store SQL query over alias `c`.
    ///
    /// ```ignore
    /// Filters::new().eq("request__channel", "Teams").to_sql()
    /// // SELECT * FROM c WHERE c.request.channel = "Teams"
    /// ```
    pub fn to_sql(&self) -> String {
        if self.is_empty() {
            return "SELECT * FROM c".to_string();
        }

        let clauses: Vec<String> = self
            .conditions()
            .map(|(path, value)| format!("{} = {}", field_ref(&path), literal(value)))
            .collect();

        format!("SELECT * FROM c WHERE {}", clauses.join(" AND "))
    }

    /// Whether `document` satisfies every condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.conditions()
            .all(|(path, expected)| lookup(document, &path) == Some(expected))
    }
}

/// Resolve a nested field by path segments.
pub fn lookup<'a>(document: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, segment| current.get(*segment))
}

fn field_ref(path: &[&str]) -> String {
    let mut out = String::from("c");
    for segment in path {
        if is_identifier(segment) {
            out.push('.');
            out.push_str(segment);
        } else {
            out.push('[');
            out.push_str(&literal(&Value::String((*segment).to_string())));
            out.push(']');
        }
    }
    out
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// JSON literal syntax is valid query syntax: strings come out double-quoted
/// and escaped, everything else renders raw.
fn literal(value: &Value) -> String {
    value.to_string()
}
