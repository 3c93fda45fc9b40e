//! Per-character audit verdicts.

use serde::{Deserialize, Serialize};

use crate::domain::schema::CharacterId;

/// Outcome of auditing one cell against the source description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictResult {
    Correct,
    /// The cell disagrees with the description; the only mutation trigger.
    Error,
    Missing,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub character_id: CharacterId,
    pub result: VerdictResult,
    /// For `Error`: the asserted true state, as a numeric hint or free text.
    pub expected_state: Option<String>,
}

impl ValidationVerdict {
    pub fn correct(id: u32) -> Self {
        Self {
            character_id: CharacterId::new(id),
            result: VerdictResult::Correct,
            expected_state: None,
        }
    }

    pub fn error(id: u32, expected_state: impl Into<String>) -> Self {
        Self {
            character_id: CharacterId::new(id),
            result: VerdictResult::Error,
            expected_state: Some(expected_state.into()),
        }
    }

    pub fn with_result(id: u32, result: VerdictResult) -> Self {
        Self {
            character_id: CharacterId::new(id),
            result,
            expected_state: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result == VerdictResult::Error
    }
}
