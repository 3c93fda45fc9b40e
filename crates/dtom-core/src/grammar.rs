//! State token grammar: free-text state assertions → canonical tokens.
//!
//! Rules, applied in order:
//! 1. a leading `characterN:` label is dropped;
//! 2. `-` (after trimming) is the missing sentinel, and empty text is malformed: both `Missing`;
//! 3. every explicit `state<digit>` marker (case-insensitive, optional space)
//!    is collected; digits here and in rule 4 are ASCII `0-9` only;
//! 4. only if rule 3 found nothing, isolated single digits are collected;
//! 5. states are deduplicated and sorted: none → absence mapping
//!    (`Gap` by default), one → `Single`, several → `MultiState`.
//!
//! `parse(format(t)) == t` holds for every well-formed token.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{StateId, StateToken};

/// What the grammar yields when no state could be read from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceMapping {
    #[default]
    Gap,
    Missing,
}

impl AbsenceMapping {
    fn token(self) -> StateToken {
        match self {
            AbsenceMapping::Gap => StateToken::Gap,
            AbsenceMapping::Missing => StateToken::Missing,
        }
    }
}

fn label_pattern() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| Regex::new(r"(?i)^\s*character\s*[0-9]+\s*:").expect("static pattern"))
}

fn marker_pattern() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?i)state\s*([0-9])").expect("static pattern"))
}

fn isolated_digit_pattern() -> &'static Regex {
    static ISOLATED: OnceLock<Regex> = OnceLock::new();
    ISOLATED.get_or_init(|| Regex::new(r"\b([0-9])\b").expect("static pattern"))
}

fn captured_digits(pattern: &Regex, text: &str) -> Vec<StateId> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| match m.as_str().as_bytes() {
            [b] if b.is_ascii_digit() => Some(b - b'0'),
            _ => None,
        })
        .collect()
}

/// Priority-ordered reader for collaborator state assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTokenGrammar {
    absence: AbsenceMapping,
}

impl StateTokenGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit absence mapping for texts that carry no state.
    pub fn with_absence(absence: AbsenceMapping) -> Self {
        Self { absence }
    }

    pub fn absence(&self) -> AbsenceMapping {
        self.absence
    }

    /// Parse one assertion. Never fails: unclassifiable text maps to the
    /// absence token.
    pub fn parse(&self, text: &str) -> StateToken {
        let body = label_pattern().replace(text, "");
        let trimmed = body.trim();

        if trimmed.is_empty() || trimmed == "-" {
            return StateToken::Missing;
        }

        let mut states = captured_digits(marker_pattern(), trimmed);
        if states.is_empty() {
            states = captured_digits(isolated_digit_pattern(), trimmed);
        }

        StateToken::from_states(states).unwrap_or_else(|| self.absence.token())
    }

    /// Parse an optional slot; an absent result is `Missing`.
    pub fn parse_raw(&self, text: Option<&str>) -> StateToken {
        text.map_or(StateToken::Missing, |t| self.parse(t))
    }

    pub fn format(token: &StateToken) -> String {
        token.to_string()
    }
}
