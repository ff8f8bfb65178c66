use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON field that deployments emit as a bare string, a list of strings, or not at all.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrVec {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    /// Reads `field` from a JSON object. Absent and `null` both mean [`StringOrVec::None`];
    /// any other non-string shape is rejected.
    pub fn from_field(item: &Value, field: &str) -> Option<Self> {
        match item.get(field) {
            None | Some(Value::Null) => Some(Self::None),
            Some(value) => Self::deserialize(value).ok(),
        }
    }

    pub fn into_set(self) -> BTreeSet<String> {
        match self {
            Self::None => BTreeSet::new(),
            Self::Single(value) => BTreeSet::from([value]),
            Self::Multiple(values) => values.into_iter().collect(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Single(value) => Some(value.as_str()),
            Self::Multiple(values) => values.first().map(|value| value.as_str()),
        }
    }
}
