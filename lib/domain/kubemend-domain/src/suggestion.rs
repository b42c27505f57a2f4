use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fix::{FixAction, FixKind};

/// How much the parser trusts a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        f.write_str(label)
    }
}

/// A fix proposal derived from diagnostic-assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: FixKind,
    pub title: String,
    pub description: String,
    pub action: FixAction,
    pub confidence: Confidence,
}

impl Suggestion {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        action: FixAction,
        confidence: Confidence,
    ) -> Self {
        Self {
            kind: action.kind(),
            title: title.into(),
            description: description.into(),
            action,
            confidence,
        }
    }
}
