//! `$TOKEN` placeholders in YAML documents.
//!
//! Documents are plain [`serde_yaml::Value`] trees. A placeholder is a whole
//! scalar string (or mapping key) starting with `$`; there is no interpolation
//! inside longer strings.

use crate::types::PodId;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use tracing::warn;

/// Value a placeholder is replaced with.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// A plain string.
    Scalar(String),
    /// Pods resolved from a scope expression; rendered as a sequence.
    PodList(Vec<PodId>),
    /// A `key=value` property; rendered as a single-entry mapping.
    KeyValue(String, String),
    /// A field taken verbatim from another document.
    Node(Value),
}

impl Replacement {
    /// Interpret a cluster property value.
    pub fn from_property(value: &str) -> Self {
        match value.split_once('=') {
            Some((key, val))
                if !key.trim().is_empty() && !key.contains(char::is_whitespace) =>
            {
                Replacement::KeyValue(key.trim().to_string(), val.trim().to_string())
            }
            _ => Replacement::Scalar(value.to_string()),
        }
    }

    /// Render as a document node.
    pub fn to_value(&self) -> Value {
        match self {
            Replacement::Scalar(s) => Value::String(s.clone()),
            Replacement::PodList(pods) => {
                Value::Sequence(pods.iter().cloned().map(Value::String).collect())
            }
            Replacement::KeyValue(key, value) => {
                let mut map = Mapping::new();
                map.insert(Value::String(key.clone()), Value::String(value.clone()));
                Value::Mapping(map)
            }
            Replacement::Node(value) => value.clone(),
        }
    }

    /// Render as a mapping key; only scalar replacements qualify.
    fn to_key(&self) -> Option<Value> {
        match self {
            Replacement::Scalar(s) => Some(Value::String(s.clone())),
            Replacement::Node(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                Some(v.clone())
            }
            _ => None,
        }
    }
}

/// Lookup table from placeholder token to [`Replacement`].
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    entries: HashMap<String, Replacement>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the top-level fields of a mapping document as replacements, so
    /// `$action` in a manifest picks up the `action` field.
    pub fn from_document(document: &Value) -> Self {
        let mut table = Self::new();
        if let Value::Mapping(map) = document {
            for (key, value) in map {
                if let Value::String(key) = key {
                    table.insert(key.clone(), Replacement::Node(value.clone()));
                }
            }
        }
        table
    }

    pub fn insert(&mut self, token: impl Into<String>, replacement: Replacement) {
        self.entries.insert(token.into(), replacement);
    }

    /// Look up by exact token, then by the token without `$`, lower-cased.
    pub fn get(&self, token: &str) -> Option<&Replacement> {
        self.entries.get(token).or_else(|| {
            token
                .strip_prefix('$')
                .and_then(|bare| self.entries.get(&bare.to_lowercase()))
        })
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }
}

fn placeholder(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if s.starts_with('$') => Some(s.as_str()),
        _ => None,
    }
}

/// Collect every placeholder scalar, depth-first in document order.
pub fn discover(document: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect(document, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (_, v) in map {
                collect(v, found);
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                collect(item, found);
            }
        }
        Value::Tagged(tagged) => collect(&tagged.value, found),
        other => {
            if let Some(token) = placeholder(other) {
                found.push(token.to_string());
            }
        }
    }
}

/// Return a copy of `document` with placeholders replaced from `table`.
///
/// Unknown placeholders are left as they are.
pub fn substitute(document: &Value, table: &ReplacementTable) -> Value {
    match document {
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (key, value) in map {
                let key = placeholder(key)
                    .and_then(|token| table.get(token))
                    .and_then(Replacement::to_key)
                    .unwrap_or_else(|| key.clone());
                if out.insert(key.clone(), substitute(value, table)).is_some() {
                    warn!(key = ?key, "Substituted key collides with an existing key");
                }
            }
            Value::Mapping(out)
        }
        Value::Sequence(seq) => Value::Sequence(seq.iter().map(|v| substitute(v, table)).collect()),
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: substitute(&tagged.value, table),
        })),
        other => placeholder(other)
            .and_then(|token| table.get(token))
            .map(Replacement::to_value)
            .unwrap_or_else(|| other.clone()),
    }
}
