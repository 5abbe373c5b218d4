//! Extraction of payloads from the backend's heterogeneous envelopes.
//!
//! CourseDesk services wrap results inconsistently: a bare array, a bare
//! object, `{data: ...}`, `{data: {questions: [...]}}`, `{question: {...}}` and
//! so on. Each call site states the shape it expects and the domain keys it
//! uses; the rule table below resolves every envelope the same way.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;

/// Shape a call site expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Single,
}

/// Domain keys a call site's payload may be nested under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keys {
    pub plural: Option<&'static str>,
    pub singular: Option<&'static str>,
}

impl Keys {
    /// No domain keys; only `data` unwrapping applies.
    pub const NONE: Self = Self {
        plural: None,
        singular: None,
    };

    #[must_use]
    pub const fn new(plural: &'static str, singular: &'static str) -> Self {
        Self {
            plural: Some(plural),
            singular: Some(singular),
        }
    }
}

/// Raw body classified by its outermost JSON type.
#[derive(Debug)]
enum Envelope<'a> {
    Array(&'a Vec<Value>),
    Object(&'a Map<String, Value>),
    Scalar,
}

impl<'a> Envelope<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items),
            Value::Object(map) => Self::Object(map),
            _ => Self::Scalar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Direct,
    Data,
    Plural,
    Singular,
}

/// Priority order. The first rule that yields a payload wins; when none
/// does, the envelope itself is the result.
const RULES: [Rule; 4] = [Rule::Direct, Rule::Data, Rule::Plural, Rule::Singular];

impl Rule {
    fn apply(self, envelope: &Envelope<'_>, shape: Shape, keys: Keys) -> Option<Value> {
        match (self, envelope, shape) {
            (Self::Direct, Envelope::Array(items), Shape::List) => {
                Some(Value::Array((*items).clone()))
            }
            (Self::Direct, Envelope::Object(map), Shape::Single) if !is_wrapper(map, keys) => {
                Some(Value::Object((*map).clone()))
            }
            (Self::Data, Envelope::Object(map), _) => match map.get("data") {
                Some(data) if !data.is_null() => Some(extract(data, shape, keys)),
                _ => None,
            },
            (Self::Plural, Envelope::Object(map), Shape::List) => keys
                .plural
                .and_then(|k| map.get(k))
                .filter(|v| v.is_array())
                .cloned(),
            (Self::Singular, Envelope::Object(map), Shape::Single) => keys
                .singular
                .and_then(|k| map.get(k))
                .filter(|v| v.is_object())
                .cloned(),
            _ => None,
        }
    }
}

/// An object is a wrapper, not an entity, when it carries a non-null `data`
/// field or the call site's singular key.
fn is_wrapper(map: &Map<String, Value>, keys: Keys) -> bool {
    map.get("data").is_some_and(|v| !v.is_null())
        || keys
            .singular
            .is_some_and(|k| map.get(k).is_some_and(Value::is_object))
}

/// Run the rule table, falling back to the envelope itself.
#[must_use]
pub fn extract(value: &Value, shape: Shape, keys: Keys) -> Value {
    let envelope = Envelope::of(value);
    RULES
        .iter()
        .find_map(|rule| rule.apply(&envelope, shape, keys))
        .unwrap_or_else(|| value.clone())
}

/// Extract a list payload. Never absent: yields an empty vector when no
/// array can be found.
#[must_use]
pub fn extract_list(value: &Value, keys: Keys) -> Vec<Value> {
    match extract(value, Shape::List, keys) {
        Value::Array(items) => items,
        other => {
            tracing::debug!(kind = json_kind(&other), "No list payload in envelope");
            Vec::new()
        }
    }
}

/// Extract a single-entity payload. Best-effort: the envelope itself comes
/// back when nothing better is found.
#[must_use]
pub fn extract_single(value: &Value, keys: Keys) -> Value {
    extract(value, Shape::Single, keys)
}

/// Extract and deserialize a list payload.
///
/// # Errors
///
/// Returns [`Error::Decode`] if an item does not match `T`. A missing list is
/// not an error.
pub fn decode_list<T: DeserializeOwned>(value: &Value, keys: Keys) -> Result<Vec<T>, Error> {
    extract_list(value, keys)
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}

/// Extract and deserialize a single entity.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the extracted payload does not match `T`.
pub fn decode_single<T: DeserializeOwned>(value: &Value, keys: Keys) -> Result<T, Error> {
    serde_json::from_value(extract_single(value, keys)).map_err(Into::into)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
