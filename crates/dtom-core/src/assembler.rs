//! Raw extraction results → one fixed-length matrix row.

use tracing::debug;

use crate::domain::{CharacterSchema, MatrixRow};
use crate::extractor::ExtractionResults;
use crate::grammar::StateTokenGrammar;

pub struct MatrixAssembler<'a> {
    schema: &'a CharacterSchema,
    grammar: StateTokenGrammar,
}

impl<'a> MatrixAssembler<'a> {
    pub fn new(schema: &'a CharacterSchema, grammar: StateTokenGrammar) -> Self {
        Self { schema, grammar }
    }

    /// Parse each schema slot in column order.
    ///
    /// The row length is always `schema.len()`: slots without a result are
    /// `Missing`, results for unknown characters are ignored.
    pub fn assemble(&self, results: &ExtractionResults) -> MatrixRow {
        for id in results.keys().filter(|id| !self.schema.contains(**id)) {
            debug!(character = id.get(), "ignoring result for character outside schema");
        }

        let tokens = self
            .schema
            .iter()
            .map(|c| self.grammar.parse_raw(results.get(&c.id).map(String::as_str)))
            .collect();
        MatrixRow::new(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CharacterDefinition, CharacterId, StateToken};

    fn schema_with_states(counts: &[u8]) -> CharacterSchema {
        CharacterSchema::new(
            counts
                .iter()
                .enumerate()
                .map(|(i, n)| {
                    CharacterDefinition::new(
                        i as u32 + 1,
                        format!("character {}", i + 1),
                        (1..=*n).map(|s| (s, format!("s{s}"))),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_assembles_mixed_assertions() {
        let schema = schema_with_states(&[2, 3, 2]);
        let results: ExtractionResults = [
            (CharacterId::new(1), "state 1".to_string()),
            (CharacterId::new(2), "state 2 and state 3".to_string()),
            (CharacterId::new(3), "Missing (?)".to_string()),
        ]
        .into_iter()
        .collect();

        let row = MatrixAssembler::new(&schema, StateTokenGrammar::new()).assemble(&results);

        assert_eq!(
            row.tokens(),
            &[
                StateToken::Single(1),
                StateToken::from_states([2, 3]).unwrap(),
                StateToken::Gap
            ]
        );
        assert_eq!(row.formatted(), "1 (2 3) ?");
    }

    #[test]
    fn test_length_survives_missing_and_stray_results() {
        let schema = schema_with_states(&[2, 2, 2, 2]);
        let results: ExtractionResults = [
            (CharacterId::new(2), "state 2".to_string()),
            (CharacterId::new(9), "state 1".to_string()),
        ]
        .into_iter()
        .collect();

        let row = MatrixAssembler::new(&schema, StateTokenGrammar::new()).assemble(&results);

        assert_eq!(row.len(), schema.len());
        assert_eq!(row.formatted(), "- 2 - -");
    }

    #[test]
    fn test_empty_results_give_all_missing_row() {
        let schema = schema_with_states(&[2, 3]);
        let row = MatrixAssembler::new(&schema, StateTokenGrammar::new())
            .assemble(&ExtractionResults::new());
        assert_eq!(row.formatted(), "- -");
    }
}
