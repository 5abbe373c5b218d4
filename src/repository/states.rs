use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::EntityId;

/// A state (jurisdiction) whose licensing rules courses are certified against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CourseState {
    #[serde(alias = "_id")]
    pub id: EntityId,
    pub name: String,
    #[serde(default, alias = "abbreviation", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Fields this client does not model, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating or editing a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StateDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            code: Some(code.into()),
        }
    }
}
