use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::EntityId;

/// A quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Question {
    #[serde(alias = "_id")]
    pub id: EntityId,
    #[serde(alias = "question", alias = "questionText")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Index into `options`, or the answer text, depending on question type.
    #[serde(default, alias = "correct_answer", skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating or editing a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(rename = "question", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl QuestionDraft {
    #[must_use]
    pub fn multiple_choice(
        text: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Self {
        Self {
            text: Some(text.into()),
            options,
            correct_answer: Some(Value::from(correct_index)),
            order: None,
        }
    }
}
