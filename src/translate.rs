//! Turning failures into one human-readable message.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Used when the caller's own default is blank.
pub const FALLBACK_MESSAGE: &str = "Request failed";

/// Error body shape the CourseDesk services return.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct BackendErrorPayload {
    #[serde(default)]
    pub message: Option<MessageField>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// `message` is either one string or a list of validation messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl BackendErrorPayload {
    /// Lenient parse: anything that is not an object, or whose fields have
    /// unexpected types, yields `None`.
    #[must_use]
    pub fn from_value(body: &Value) -> Option<Self> {
        if !body.is_object() {
            return None;
        }
        let field = |key: &str| body.get(key).cloned().unwrap_or(Value::Null);
        Some(Self {
            message: serde_json::from_value::<Option<MessageField>>(field("message"))
                .ok()
                .flatten(),
            msg: serde_json::from_value::<Option<String>>(field("msg"))
                .ok()
                .flatten(),
            error: body.get("error").filter(|v| !v.is_null()).cloned(),
        })
    }

    /// First non-empty message in priority order: string `message`, joined
    /// `message` list, `msg`, then `error`.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let from_message = match &self.message {
            Some(MessageField::One(s)) => non_empty(s.clone()),
            Some(MessageField::Many(items)) => non_empty(
                items
                    .iter()
                    .filter(|s| !s.trim().is_empty())
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            None => None,
        };
        from_message
            .or_else(|| self.msg.clone().and_then(non_empty))
            .or_else(|| match &self.error {
                Some(Value::String(s)) => non_empty(s.clone()),
                Some(other) => non_empty(other.to_string()),
                None => None,
            })
    }
}

/// Message for a failed call, falling back to `default`.
///
/// Backend bodies are consulted first. Transport failures carry no body and
/// resolve to `default`; local failures (storage, config, decode) use their
/// own description. Never returns an empty string.
#[must_use]
pub fn error_message(error: &Error, default: &str) -> String {
    let from_body = error
        .body()
        .and_then(BackendErrorPayload::from_value)
        .and_then(|payload| payload.message());
    let from_error = match error {
        Error::Storage(_) | Error::Config(_) | Error::Decode(_) | Error::InvalidUrl(_) => {
            non_empty(error.to_string())
        }
        _ => None,
    };
    from_body
        .or(from_error)
        .unwrap_or_else(|| default_message(default))
}

/// Message for an arbitrary failure value, falling back to `default`.
///
/// Accepts a wrapped response (`{response: {data: {...}}}`), a bare backend
/// payload, or a generic `{message: ...}` error object.
#[must_use]
pub fn message_from_value(failure: &Value, default: &str) -> String {
    let body = failure.pointer("/response/data");
    body.and_then(BackendErrorPayload::from_value)
        .and_then(|p| p.message())
        .or_else(|| BackendErrorPayload::from_value(failure).and_then(|p| p.message()))
        .unwrap_or_else(|| default_message(default))
}

fn default_message(default: &str) -> String {
    non_empty(default.to_owned()).unwrap_or_else(|| FALLBACK_MESSAGE.to_owned())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}
