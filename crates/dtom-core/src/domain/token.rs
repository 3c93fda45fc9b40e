//! Canonical state tokens: one matrix cell.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one state, scoped to its character. Single digit (`0..=9`).
pub type StateId = u8;

/// Highest state id representable in the single-digit symbol alphabet.
pub const MAX_STATE_ID: StateId = 9;

/// Text that is not one of the four formatted token shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized state token: {0:?}")]
pub struct ParseError(pub String);

/// Two or more states, kept sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateSet(BTreeSet<StateId>);

impl StateSet {
    /// Build a set; `None` when fewer than two distinct states remain.
    pub fn new(states: impl IntoIterator<Item = StateId>) -> Option<Self> {
        let set: BTreeSet<StateId> = states.into_iter().collect();
        (set.len() >= 2).then_some(Self(set))
    }

    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.0.contains(&state)
    }
}

/// Zero, one or many states asserted for one character of one species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StateToken {
    Single(StateId),
    MultiState(StateSet),
    /// Could not be determined; the character may be inapplicable.
    Gap,
    /// The trait is undefined or absent for this taxon.
    Missing,
}

impl StateToken {
    /// `MultiState` from the given states, collapsing to `Single` for one state.
    ///
    /// Returns `None` for an empty input: whether "nothing" means `Gap` or
    /// `Missing` is the caller's decision.
    pub fn from_states(states: impl IntoIterator<Item = StateId>) -> Option<Self> {
        let set: BTreeSet<StateId> = states.into_iter().collect();
        match set.len() {
            0 => None,
            1 => set.into_iter().next().map(StateToken::Single),
            _ => StateSet::new(set).map(StateToken::MultiState),
        }
    }

    /// States carried by this token, ascending.
    pub fn states(&self) -> Vec<StateId> {
        match self {
            StateToken::Single(id) => vec![*id],
            StateToken::MultiState(set) => set.iter().collect(),
            StateToken::Gap | StateToken::Missing => Vec::new(),
        }
    }

    /// A token is well-formed when every state fits the single-digit alphabet.
    pub fn is_well_formed(&self) -> bool {
        self.states().iter().all(|id| *id <= MAX_STATE_ID)
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateToken::Single(id) => write!(f, "{id}"),
            StateToken::MultiState(set) => {
                let joined = set
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "({joined})")
            }
            StateToken::Gap => f.write_str("?"),
            StateToken::Missing => f.write_str("-"),
        }
    }
}

/// Strict reader for the formatted shapes only: `3`, `(1 2)`, `?`, `-`.
impl FromStr for StateToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        match text {
            "?" => return Ok(StateToken::Gap),
            "-" => return Ok(StateToken::Missing),
            _ => {}
        }

        let digit = |part: &str| -> Result<StateId, ParseError> {
            match part.as_bytes() {
                [b] if b.is_ascii_digit() => Ok(b - b'0'),
                _ => Err(ParseError(s.to_string())),
            }
        };

        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let states = inner
                .split_whitespace()
                .map(digit)
                .collect::<Result<Vec<_>, _>>()?;
            return StateSet::new(states)
                .map(StateToken::MultiState)
                .ok_or_else(|| ParseError(s.to_string()));
        }

        digit(text).map(StateToken::Single)
    }
}

impl From<StateToken> for String {
    fn from(token: StateToken) -> Self {
        token.to_string()
    }
}

impl TryFrom<String> for StateToken {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shapes() {
        assert_eq!(StateToken::Single(2).to_string(), "2");
        assert_eq!(
            StateToken::from_states([3, 1, 2]).unwrap().to_string(),
            "(1 2 3)"
        );
        assert_eq!(StateToken::Gap.to_string(), "?");
        assert_eq!(StateToken::Missing.to_string(), "-");
    }

    #[test]
    fn test_from_states_collapses_duplicates() {
        assert_eq!(StateToken::from_states([4, 4]), Some(StateToken::Single(4)));
        assert_eq!(StateToken::from_states(Vec::<StateId>::new()), None);
    }

    #[test]
    fn test_strict_parse_rejects_prose() {
        assert!("state 1".parse::<StateToken>().is_err());
        assert!("(1)".parse::<StateToken>().is_err());
        assert!("12".parse::<StateToken>().is_err());
        assert_eq!("(2 3)".parse::<StateToken>().unwrap().states(), vec![2, 3]);
    }

    #[test]
    fn test_serde_uses_formatted_text() {
        let token = StateToken::from_states([1, 2]).unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"(1 2)\"");
        let back: StateToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
