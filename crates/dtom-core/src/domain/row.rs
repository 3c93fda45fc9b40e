//! Matrix rows and the assembled species × character matrix.

use serde::{Deserialize, Serialize};

use crate::domain::error::FormatError;
use crate::domain::schema::CharacterId;
use crate::domain::token::StateToken;

/// One species' tokens in schema column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatrixRow(Vec<StateToken>);

impl MatrixRow {
    pub fn new(tokens: Vec<StateToken>) -> Self {
        Self(tokens)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[StateToken] {
        &self.0
    }

    pub fn get(&self, id: CharacterId) -> Option<&StateToken> {
        id.index().and_then(|i| self.0.get(i))
    }

    /// Overwrite the cell of `id`, returning the previous token.
    pub fn set(&mut self, id: CharacterId, token: StateToken) -> Result<StateToken, FormatError> {
        let slot = id
            .index()
            .and_then(|i| self.0.get_mut(i))
            .ok_or(FormatError::UnknownCharacter(id))?;
        Ok(std::mem::replace(slot, token))
    }

    /// Space-separated formatted tokens, e.g. `1 (2 3) ?`.
    pub fn formatted(&self) -> String {
        self.0
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Terminal state of a row's correction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Independent repeated audits agreed with the row.
    Converged,
    /// The round budget ran out; the row is best effort.
    Exhausted,
}

/// A finalized species row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub species: String,
    pub row: MatrixRow,
    pub status: RowStatus,
}

/// Species rows in input order. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    entries: Vec<MatrixEntry>,
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MatrixEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exhausted(&self) -> impl Iterator<Item = &MatrixEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == RowStatus::Exhausted)
    }
}

impl FromIterator<MatrixEntry> for Matrix {
    fn from_iter<I: IntoIterator<Item = MatrixEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_only_target_cell() {
        let mut row = MatrixRow::new(vec![StateToken::Single(1), StateToken::Gap]);
        let previous = row.set(CharacterId::new(2), StateToken::Single(3)).unwrap();

        assert_eq!(previous, StateToken::Gap);
        assert_eq!(row.formatted(), "1 3");
    }

    #[test]
    fn test_set_out_of_range_is_rejected() {
        let mut row = MatrixRow::new(vec![StateToken::Missing]);
        assert!(row.set(CharacterId::new(0), StateToken::Gap).is_err());
        assert!(row.set(CharacterId::new(2), StateToken::Gap).is_err());
        assert_eq!(row.len(), 1);
    }
}
